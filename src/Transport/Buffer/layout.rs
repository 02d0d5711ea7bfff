use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// "ORDERQ01": identifies an initialised transport region.
pub const TRANSPORT_MAGIC: u64 = 0x4F52_4445_5251_3031;
pub const TRANSPORT_VERSION: u32 = 1;

/// Set in [`TransportHeader::flags`] once the receiver has torn the transport down.
pub const FLAG_CLOSED: u32 = 1;

/// Control block at the very beginning of the transport region.
///
/// The slot array follows at `size_of::<TransportHeader>()`. Everything a
/// submitter needs to talk to the transport (depth, record size, stride) is read
/// from here rather than from its own configuration.
#[repr(C, align(128))]
pub struct TransportHeader {
    /// Written last by the creator; attachers check it with Acquire.
    pub magic: AtomicU64,

    pub version: u32,

    /// Lifecycle flags (see [`FLAG_CLOSED`]).
    pub flags: AtomicU32,

    /// Maximum number of undelivered records.
    pub capacity: u64,

    /// Maximum payload bytes per record.
    pub message_size: u64,

    /// Byte distance between consecutive slots.
    pub slot_stride: u64,

    /// Bumped after every publish. The consumer waits on this.
    pub data_signal: AtomicU32,

    /// Bumped after every slot is freed (and on close). Blocked senders wait on this.
    pub space_signal: AtomicU32,

    /// The "tail" cursor for producers. Atomically incremented to claim a slot for writing.
    pub tail: CachePadded<AtomicU64>,

    /// The "head" cursor for the consumer.
    pub head: CachePadded<AtomicU64>,
}
