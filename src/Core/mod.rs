pub mod counter;
pub mod futex;
pub mod gate;
pub mod SharedMemory;

pub use counter::SharedCounter;
pub use gate::{Admission, AdmissionGate, AdmissionPermit};
pub use SharedMemory::{
    attach_shared_memory, create_shared_memory, create_shared_memory_with_mode,
    unlink_shared_memory, unlink_shared_memory_if_same, Access, RawHandle, SharedMemoryBackend,
};
