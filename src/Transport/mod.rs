mod builder;
mod consumer;
mod producer;
mod region;

pub use builder::TransportBuilder;
pub use consumer::Consumer;
pub use producer::Producer;
pub use region::TransportRegion;
pub use Structs::{MessageMeta, OrderRecord};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{RingBuffer, SlotHeader, SLOT_ALIGN}; // re-export for stable path
}

pub mod Structs {
    pub mod Record_Structs;
    pub use Record_Structs::{MessageMeta, OrderRecord}; // re-export for stable path
}
