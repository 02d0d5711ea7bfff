use std::io;
use std::mem::size_of;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use log::debug;

use crate::config::{MAX_MESSAGE_SIZE, MAX_QUEUE_DEPTH, MIN_MESSAGE_SIZE};
use crate::Core::SharedMemory::{
    attach_shared_memory, create_shared_memory_with_mode, unlink_shared_memory_if_same, Access,
    SharedMemoryBackend,
};
use crate::Transport::Buffer::layout::{TransportHeader, TRANSPORT_MAGIC, TRANSPORT_VERSION};
use crate::Transport::Buffer::RingBuffer;
use crate::{Error, Result};

/// A mapped transport: the shared region and the ring view over it.
pub struct TransportRegion {
    pub(crate) shm: Box<dyn SharedMemoryBackend>,
    pub(crate) ring: RingBuffer,
    pub(crate) name: String,
}

impl TransportRegion {
    /// Create a fresh transport with permission bits `mode`, replacing a stale
    /// one with the same name.
    pub fn create(
        name: &str,
        capacity: usize,
        message_size: usize,
        mode: u32,
    ) -> Result<Self> {
        if !(1..=MAX_QUEUE_DEPTH).contains(&capacity) {
            return Err(Error::InvalidConfig(format!(
                "queue_depth {capacity} outside 1..={MAX_QUEUE_DEPTH}"
            )));
        }
        if !(MIN_MESSAGE_SIZE..=MAX_MESSAGE_SIZE).contains(&message_size) {
            return Err(Error::InvalidConfig(format!(
                "message_size {message_size} outside {MIN_MESSAGE_SIZE}..={MAX_MESSAGE_SIZE}"
            )));
        }

        let size = RingBuffer::region_size(capacity, message_size).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "transport of {capacity} x {message_size} bytes is too large"
            ))
        })?;
        let shm = create_shared_memory_with_mode(name, size, mode)
            .map_err(|e| Error::resource("create transport", name, e))?;

        let header_ptr = shm.as_ptr() as *mut TransportHeader;
        if (header_ptr as usize) % 128 != 0 {
            return Err(Error::Corrupt("shared memory not properly aligned"));
        }

        let ring = unsafe {
            std::ptr::write(
                header_ptr,
                TransportHeader {
                    magic: AtomicU64::new(0),
                    version: TRANSPORT_VERSION,
                    flags: AtomicU32::new(0),
                    capacity: capacity as u64,
                    message_size: message_size as u64,
                    slot_stride: RingBuffer::slot_stride(message_size) as u64,
                    data_signal: AtomicU32::new(0),
                    space_signal: AtomicU32::new(0),
                    tail: CachePadded::new(AtomicU64::new(0)),
                    head: CachePadded::new(AtomicU64::new(0)),
                },
            );
            let ring = RingBuffer::new(header_ptr, shm.as_ptr().add(size_of::<TransportHeader>()));
            ring.init_slots();
            (*header_ptr).magic.store(TRANSPORT_MAGIC, Ordering::Release);
            ring
        };

        debug!(
            "transport {} created: depth={} message_size={} region={}B",
            name, capacity, message_size, size
        );
        Ok(Self {
            shm,
            ring,
            name: name.to_string(),
        })
    }

    /// Attach to a transport created by the receiver.
    pub fn attach(name: &str) -> Result<Self> {
        let shm = attach_shared_memory(name, size_of::<TransportHeader>(), Access::ReadWrite)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::TransportMissing(name.to_string()),
                _ => Error::resource("attach transport", name, e),
            })?;

        let header_ptr = shm.as_ptr() as *const TransportHeader;
        let header = unsafe { &*header_ptr };
        if header.magic.load(Ordering::Acquire) != TRANSPORT_MAGIC {
            return Err(Error::Corrupt(
                "invalid magic number - transport not initialized",
            ));
        }
        if header.version != TRANSPORT_VERSION {
            return Err(Error::Corrupt("unsupported transport version"));
        }

        let capacity = header.capacity as usize;
        let message_size = header.message_size as usize;
        let fits = RingBuffer::region_size(capacity, message_size)
            .map_or(false, |needed| shm.size() >= needed);
        if capacity == 0
            || message_size > MAX_MESSAGE_SIZE
            || header.slot_stride as usize != RingBuffer::slot_stride(message_size)
            || !fits
        {
            return Err(Error::Corrupt("transport header does not match region"));
        }

        let ring = unsafe {
            RingBuffer::new(header_ptr, shm.as_ptr().add(size_of::<TransportHeader>()))
        };
        if ring.is_closed() {
            return Err(Error::TransportClosed);
        }

        Ok(Self {
            shm,
            ring,
            name: name.to_string(),
        })
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Close the ring and remove the name. The mapping lives until the last
    /// handle drops.
    pub(crate) fn close_and_unlink(&self) -> Result<()> {
        self.ring.close();
        let removed = unlink_shared_memory_if_same(&self.name, self.shm.as_ref())
            .map_err(|e| Error::resource("unlink transport", &self.name, e))?;
        if removed {
            debug!("transport {} destroyed", self.name);
        } else {
            debug!("transport {} already replaced, name left in place", self.name);
        }
        Ok(())
    }
}
