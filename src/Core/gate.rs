//! Admission gate: a POSIX named counting semaphore.
//!
//! The receiver creates the gate with a fixed capacity; submitters open it by
//! name and hold one slot from before they attach to the transport until their
//! send returns. [`Admission`] wraps the gate for callers that may have to run
//! without one (degraded mode).

use std::ffi::CString;
use std::fs::Permissions;
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;

use log::{debug, warn};

use crate::config::DEFAULT_RESOURCE_MODE;
use crate::{Error, Result};

pub struct AdmissionGate {
    pub(crate) sem: *mut libc::sem_t,
    pub(crate) name: String,
    pub(crate) capacity: Option<u32>,
    pub(crate) owner: bool,
    pub(crate) closed: bool,
    /// Device and inode of the semaphore file the creator made.
    pub(crate) identity: Option<(u64, u64)>,
}

// POSIX semaphores are safe to use from any thread.
unsafe impl Send for AdmissionGate {}
unsafe impl Sync for AdmissionGate {}

fn sem_name(name: &str) -> io::Result<CString> {
    let bare = crate::config::resource_name(name)
        .map_err(|reason| io::Error::new(io::ErrorKind::InvalidInput, reason))?;
    CString::new(format!("/{bare}"))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Where glibc keeps a named semaphore.
fn sem_path(name: &str) -> Option<PathBuf> {
    let bare = crate::config::resource_name(name).ok()?;
    Some(PathBuf::from("/dev/shm").join(format!("sem.{bare}")))
}

fn sem_identity(name: &str) -> Option<(u64, u64)> {
    let meta = std::fs::metadata(sem_path(name)?).ok()?;
    Some((meta.dev(), meta.ino()))
}

impl AdmissionGate {
    /// Create the gate with `capacity` free slots, removing a stale one first.
    pub fn create(name: &str, capacity: u32) -> Result<Self> {
        Self::create_with_mode(name, capacity, DEFAULT_RESOURCE_MODE)
    }

    /// [`create`](Self::create) with explicit permission bits. The bits are
    /// applied after creation, so the umask does not narrow them.
    pub fn create_with_mode(name: &str, capacity: u32, mode: u32) -> Result<Self> {
        let c_name = sem_name(name).map_err(|e| Error::resource("sem_open", name, e))?;
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "admission capacity must be at least 1".into(),
            ));
        }
        unsafe {
            libc::sem_unlink(c_name.as_ptr());
        }
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                (mode & 0o777) as libc::c_uint,
                capacity as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(Error::resource("sem_open", name, io::Error::last_os_error()));
        }
        if let Some(path) = sem_path(name) {
            if let Err(e) = std::fs::set_permissions(&path, Permissions::from_mode(mode & 0o777)) {
                warn!("could not set mode {:o} on admission gate {}: {e}", mode & 0o777, name);
            }
        }
        debug!("admission gate {} created with {} slots", name, capacity);
        Ok(Self {
            sem,
            name: name.to_string(),
            capacity: Some(capacity),
            owner: true,
            closed: false,
            identity: sem_identity(name),
        })
    }

    /// Open a gate created by the receiver.
    pub fn open(name: &str) -> Result<Self> {
        let c_name = sem_name(name).map_err(|e| Error::resource("sem_open", name, e))?;
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(Error::resource("sem_open", name, io::Error::last_os_error()));
        }
        Ok(Self {
            sem,
            name: name.to_string(),
            capacity: None,
            owner: false,
            closed: false,
            identity: None,
        })
    }

    /// Block until a slot is free and take it. Signal interruptions are retried.
    pub fn acquire(&self) -> Result<AdmissionPermit<'_>> {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(AdmissionPermit { gate: Some(self) });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::resource("sem_wait", &self.name, err));
            }
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<AdmissionPermit<'_>>> {
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(Some(AdmissionPermit { gate: Some(self) }));
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(None),
                Some(libc::EINTR) => continue,
                _ => return Err(Error::resource("sem_trywait", &self.name, err)),
            }
        }
    }

    /// Return one slot. Never blocks.
    ///
    /// Only an [`AdmissionPermit`] calls this, once, so a slot can never be
    /// handed back without having been taken.
    fn release(&self) -> Result<()> {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            return Err(Error::resource(
                "sem_post",
                &self.name,
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// Free slots at this instant.
    pub fn available(&self) -> Result<u32> {
        let mut value: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(self.sem, &mut value) } != 0 {
            return Err(Error::resource(
                "sem_getvalue",
                &self.name,
                io::Error::last_os_error(),
            ));
        }
        Ok(value.max(0) as u32)
    }

    /// Capacity the gate was created with; unknown for openers.
    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Close the handle and, for the creator, remove the name.
    pub fn destroy(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        unsafe {
            libc::sem_close(self.sem);
        }
        // The name may already belong to a gate created after this one.
        if self.owner && sem_identity(&self.name) == self.identity {
            let c_name = sem_name(&self.name)
                .map_err(|e| Error::resource("sem_unlink", &self.name, e))?;
            if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::NotFound {
                    return Err(Error::resource("sem_unlink", &self.name, err));
                }
            }
            debug!("admission gate {} destroyed", self.name);
        }
        Ok(())
    }
}

impl Drop for AdmissionGate {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// One held slot. Dropping it returns the slot, whatever path the holder took.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit<'a> {
    gate: Option<&'a AdmissionGate>,
}

impl AdmissionPermit<'_> {
    /// A permit that holds nothing, used when no gate is available.
    pub fn unbounded() -> Self {
        AdmissionPermit { gate: None }
    }

    pub fn is_gated(&self) -> bool {
        self.gate.is_some()
    }

    /// Give the slot back now and report a failed post. Dropping the permit
    /// does the same but can only log the failure. A no-op for unbounded
    /// permits.
    pub fn release(mut self) -> Result<()> {
        match self.gate.take() {
            Some(gate) => gate.release(),
            None => Ok(()),
        }
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            if let Err(e) = gate.release() {
                warn!("failed to release admission slot: {e}");
            }
        }
    }
}

/// Admission control as seen by a role: a real gate, or degraded mode.
pub enum Admission {
    Gated(AdmissionGate),
    Unbounded,
}

impl Admission {
    /// Apply the gate-failure policy to a create/open attempt.
    ///
    /// Non-strict: log a warning and continue without admission control.
    /// Strict: the failure is returned as [`Error::GateUnavailable`].
    pub fn from_attempt(attempt: Result<AdmissionGate>, strict: bool, name: &str) -> Result<Self> {
        match attempt {
            Ok(gate) => Ok(Admission::Gated(gate)),
            Err(err) if strict => Err(Error::GateUnavailable {
                name: name.to_string(),
                source: match err {
                    Error::Resource { source, .. } => source,
                    other => io::Error::new(io::ErrorKind::Other, other.to_string()),
                },
            }),
            Err(err) => {
                warn!("admission gate unavailable, continuing without admission control: {err}");
                Ok(Admission::Unbounded)
            }
        }
    }

    /// Take a slot, or an empty permit in degraded mode.
    pub fn acquire(&self) -> Result<AdmissionPermit<'_>> {
        match self {
            Admission::Gated(gate) => gate.acquire(),
            Admission::Unbounded => Ok(AdmissionPermit::unbounded()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Admission::Unbounded)
    }

    pub fn destroy(self) -> Result<()> {
        match self {
            Admission::Gated(gate) => gate.destroy(),
            Admission::Unbounded => Ok(()),
        }
    }
}
