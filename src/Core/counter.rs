//! The shared order counter.
//!
//! One `u64` in a named region. The receiver is the only writer; submitters map
//! the region read-only and load it without any cross-process synchronisation,
//! so a reader may see a value that is already out of date.

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use super::SharedMemory::{
    attach_shared_memory, create_shared_memory_with_mode, unlink_shared_memory_if_same, Access,
    SharedMemoryBackend,
};
use crate::config::DEFAULT_RESOURCE_MODE;
use crate::{Error, Result};

pub const COUNTER_REGION_SIZE: usize = size_of::<AtomicU64>();

pub struct SharedCounter {
    pub(crate) shm: Box<dyn SharedMemoryBackend>,
    pub(crate) name: String,
    pub(crate) owner: bool,
    pub(crate) unlinked: bool,
}

impl SharedCounter {
    /// Create the region (replacing a stale one) and set the counter to zero.
    pub fn create_and_zero(name: &str) -> Result<Self> {
        Self::create_and_zero_with_mode(name, DEFAULT_RESOURCE_MODE)
    }

    /// [`create_and_zero`](Self::create_and_zero) with explicit permission bits.
    pub fn create_and_zero_with_mode(name: &str, mode: u32) -> Result<Self> {
        let shm = create_shared_memory_with_mode(name, COUNTER_REGION_SIZE, mode)
            .map_err(|e| Error::resource("create shared counter", name, e))?;
        let counter = Self {
            shm,
            name: name.to_string(),
            owner: true,
            unlinked: false,
        };
        counter.cell().store(0, Ordering::Release);
        debug!("shared counter {} created", name);
        Ok(counter)
    }

    /// Map an existing counter read-only.
    pub fn attach_read_only(name: &str) -> Result<Self> {
        let shm = attach_shared_memory(name, COUNTER_REGION_SIZE, Access::ReadOnly)
            .map_err(|e| Error::resource("attach shared counter", name, e))?;
        Ok(Self {
            shm,
            name: name.to_string(),
            owner: false,
            unlinked: false,
        })
    }

    #[inline]
    fn cell(&self) -> &AtomicU64 {
        // Safety: the mapping is page aligned, at least COUNTER_REGION_SIZE bytes
        // and lives as long as `self`.
        unsafe { &*(self.shm.as_ptr() as *const AtomicU64) }
    }

    /// Add one and return the value right after the increment.
    pub fn increment(&self) -> Result<u64> {
        if !self.shm.is_writable() {
            return Err(Error::ReadOnly);
        }
        Ok(self.cell().fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Current value. Relaxed: not ordered with any particular send.
    pub fn load(&self) -> u64 {
        self.cell().load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Unmap the region and, for the creator, remove its name.
    ///
    /// Read-only attachments held by other processes keep their own mappings.
    /// If the name already points at a newer counter it is left alone.
    pub fn destroy(mut self) -> Result<()> {
        self.unlink()
    }

    fn unlink(&mut self) -> Result<()> {
        if !self.owner || self.unlinked {
            return Ok(());
        }
        self.unlinked = true;
        let removed = unlink_shared_memory_if_same(&self.name, self.shm.as_ref())
            .map_err(|e| Error::resource("unlink shared counter", &self.name, e))?;
        if removed {
            debug!("shared counter {} destroyed", self.name);
        }
        Ok(())
    }
}

impl Drop for SharedCounter {
    fn drop(&mut self) {
        let _ = self.unlink();
    }
}
