use std::mem::size_of;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

use super::layout::{TransportHeader, FLAG_CLOSED};
use super::Buffer::{RingBuffer, SlotHeader, SLOT_ALIGN};
use crate::Core::futex;
use crate::Transport::Structs::Record_Structs::MessageMeta;
use crate::{Error, Result};

impl RingBuffer {
    /// Create a ring buffer view over an existing memory region.
    ///
    /// # Safety
    /// `header` must point at an initialised [`TransportHeader`] and `buffer_base`
    /// at `capacity * stride` bytes of slots, both valid for the view's lifetime.
    pub unsafe fn new(header: *const TransportHeader, buffer_base: *mut u8) -> Self {
        Self {
            header,
            buffer_base,
            capacity: (*header).capacity as usize,
            message_size: (*header).message_size as usize,
            stride: (*header).slot_stride as usize,
        }
    }

    /// Size in bytes of one slot stride for records of `message_size` bytes.
    #[inline]
    pub fn slot_stride(message_size: usize) -> usize {
        (size_of::<SlotHeader>() + message_size + SLOT_ALIGN - 1) & !(SLOT_ALIGN - 1)
    }

    /// Bytes needed for the header plus `capacity` slots, or `None` if that
    /// does not fit in a `usize`.
    pub fn region_size(capacity: usize, message_size: usize) -> Option<usize> {
        let stride = size_of::<SlotHeader>()
            .checked_add(message_size)?
            .checked_add(SLOT_ALIGN - 1)?
            & !(SLOT_ALIGN - 1);
        capacity
            .checked_mul(stride)?
            .checked_add(size_of::<TransportHeader>())
    }

    /// Initialize per-slot sequence numbers to k for k in 0..capacity.
    /// This should ONLY be called by the creator process.
    ///
    /// # Safety
    /// Caller guarantees the underlying memory is allocated and writable.
    pub unsafe fn init_slots(&self) {
        for k in 0..self.capacity {
            let slot = self.slot_mut(k);
            (*slot).sequence.store(k as u64, Relaxed);
        }
    }

    #[inline]
    unsafe fn slot_mut(&self, index: usize) -> *mut SlotHeader {
        self.buffer_base.add(index * self.stride) as *mut SlotHeader
    }

    #[inline]
    unsafe fn payload_mut(slot: *mut SlotHeader) -> *mut u8 {
        (slot as *mut u8).add(size_of::<SlotHeader>())
    }

    #[inline]
    fn header(&self) -> &TransportHeader {
        // Safety: valid for the lifetime of the view (see `new`).
        unsafe { &*self.header }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// Records published but not yet taken by the consumer.
    pub fn len(&self) -> usize {
        let header = self.header();
        let tail = header.tail.load(Acquire);
        let head = header.head.load(Acquire);
        tail.saturating_sub(head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue reserves a slot and publishes the record.
    /// Returns the slot index on success, or None if the ring is full.
    ///
    /// The payload must already be checked against `message_size`.
    pub fn enqueue(&self, meta: MessageMeta, payload: &[u8]) -> Option<usize> {
        let tail_atomic = &self.header().tail;

        loop {
            let tail = tail_atomic.load(Relaxed);
            let idx = (tail % self.capacity as u64) as usize;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - tail as i64;

            if dif == 0 {
                if tail_atomic
                    .compare_exchange_weak(tail, tail + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    // We own this slot now
                    let len = payload.len().min(self.message_size);
                    unsafe {
                        (*slot_ptr).meta = meta;
                        (*slot_ptr).meta.payload_len = len as u32;
                        ptr::copy_nonoverlapping(payload.as_ptr(), Self::payload_mut(slot_ptr), len);

                        // Publish
                        (*slot_ptr).sequence.store(tail + 1, Release);
                    }
                    return Some(idx);
                }
                continue;
            } else if dif < 0 {
                // full
                return None;
            } else {
                // another producer moved tail past us; reload
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Dequeue takes the oldest published record.
    /// Returns Ok(None) if nothing is ready.
    pub fn dequeue(&self) -> Result<Option<(MessageMeta, Vec<u8>)>> {
        let head_atomic = &self.header().head;

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head % self.capacity as u64) as usize;
            let slot_ptr = unsafe { self.slot_mut(idx) };
            let seq = unsafe { &(*slot_ptr).sequence }.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let meta = unsafe { (*slot_ptr).meta };
                    let len = meta.payload_len as usize;
                    let payload = if len <= self.message_size {
                        let mut payload = vec![0u8; len];
                        unsafe {
                            ptr::copy_nonoverlapping(
                                Self::payload_mut(slot_ptr),
                                payload.as_mut_ptr(),
                                len,
                            );
                        }
                        Some(payload)
                    } else {
                        None
                    };

                    // free slot for future producers
                    unsafe {
                        (*slot_ptr)
                            .sequence
                            .store(head + self.capacity as u64, Release);
                    }
                    self.signal_space();

                    return match payload {
                        Some(payload) => Ok(Some((meta, payload))),
                        None => Err(Error::Corrupt("slot payload length exceeds record size")),
                    };
                }
                continue;
            } else if dif < 0 {
                // empty, or the producer has not published yet
                return Ok(None);
            } else {
                std::hint::spin_loop();
                continue;
            }
        }
    }

    /// Current value of the data signal. Read it before trying to dequeue.
    pub fn data_epoch(&self) -> u32 {
        self.header().data_signal.load(Acquire)
    }

    /// Current value of the space signal. Read it before trying to enqueue.
    pub fn space_epoch(&self) -> u32 {
        self.header().space_signal.load(Acquire)
    }

    /// Signal the consumer that new data is available
    pub fn signal_consumer(&self) {
        let signal = &self.header().data_signal;
        signal.fetch_add(1, Release);
        futex::futex_wake(signal);
    }

    /// Signal blocked producers that a slot was freed
    pub fn signal_space(&self) {
        let signal = &self.header().space_signal;
        signal.fetch_add(1, Release);
        futex::futex_wake_all(signal);
    }

    /// Wait until the data signal moves past `seen`
    pub fn wait_for_data(&self, seen: u32) {
        futex::futex_wait(&self.header().data_signal, seen);
    }

    /// Wait until the space signal moves past `seen`
    pub fn wait_for_space(&self, seen: u32) {
        futex::futex_wait(&self.header().space_signal, seen);
    }

    /// Wake every waiter on both signals.
    pub fn wake_all(&self) {
        let header = self.header();
        header.data_signal.fetch_add(1, Release);
        header.space_signal.fetch_add(1, Release);
        futex::futex_wake_all(&header.data_signal);
        futex::futex_wake_all(&header.space_signal);
    }

    pub fn is_closed(&self) -> bool {
        self.header().flags.load(Acquire) & FLAG_CLOSED != 0
    }

    /// Mark the transport closed and wake everyone so blocked senders can fail.
    pub fn close(&self) {
        self.header().flags.fetch_or(FLAG_CLOSED, AcqRel);
        self.wake_all();
    }
}
