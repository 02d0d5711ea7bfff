// The shared ring the transport is built on - one per transport region

use super::layout::TransportHeader;
use crate::Transport::Structs::Record_Structs::MessageMeta;

use std::sync::atomic::AtomicU64;

/// Slots are laid out on this boundary.
pub const SLOT_ALIGN: usize = 64;

/// Fixed part of every slot; `message_size` payload bytes follow it.
///
/// This struct represents the actual data layout in shared memory.
/// It is marked `#[repr(C)]` to ensure a defined and stable memory layout.
#[repr(C)]
pub struct SlotHeader {
    /// The sequence number of the slot. This is the core of the synchronization.
    /// - A producer claims a `tail` sequence and waits for the `sequence` in
    ///   the target slot to equal `tail`.
    /// - After writing, it sets the `sequence` to `tail + 1`, signaling completion.
    /// - The consumer waits for the `sequence` in its `head` slot to equal
    ///   `head + 1`, and after reading stores `head + capacity` to hand the
    ///   slot back to producers.
    pub sequence: AtomicU64,

    /// Transport-only metadata (sender, timestamp, length).
    pub meta: MessageMeta,
}

/// A bounded, lock-free ring buffer view over a transport region.
///
/// This struct is NOT stored in shared memory. It is a transient view that holds
/// pointers to the shared memory region.
///
/// ### Concurrency Design:
/// - **Producers (Enqueue)**: claim a slot by CAS on `tail`, write, then publish
///   through the slot `sequence`. A record becomes visible all at once.
/// - **Consumer (Dequeue)**: claims the `head` slot once its `sequence` says the
///   write finished. Records leave in the order their slots were claimed.
///
/// Capacity need not be a power of two; positions wrap with `%`.
///
/// ### Stalled claims:
/// A producer that dies between claiming `tail` and publishing the slot leaves
/// that slot claimed but unpublished. The consumer cannot skip it (it has no way
/// to tell a slow writer from a dead one), so every later record stays
/// undelivered and [`dequeue`](Self::dequeue) keeps returning `Ok(None)` until
/// the receiver recreates the transport. The window is a `memcpy` of at most
/// `message_size` bytes with no syscall in it.
pub struct RingBuffer {
    /// Pointer to the control block at the start of the region.
    pub(crate) header: *const TransportHeader,

    /// Pointer to the first slot.
    pub(crate) buffer_base: *mut u8,

    /// Number of slots.
    pub(crate) capacity: usize,

    /// Maximum payload bytes per slot.
    pub(crate) message_size: usize,

    /// Byte distance between slots.
    pub(crate) stride: usize,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
