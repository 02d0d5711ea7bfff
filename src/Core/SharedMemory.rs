// Named shared memory regions backed by /dev/shm
// The receiver creates regions, submitters attach to them by name

use std::fmt::Debug;
use std::io;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Shared memory backend trait for cross-process memory mapping
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;

    /// Whether the mapping was made with write access
    fn is_writable(&self) -> bool;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// How an attachment maps the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

/// Location of the backing file for a region name (leading `/` allowed).
pub fn shm_path(name: &str) -> io::Result<PathBuf> {
    let bare = crate::config::resource_name(name)
        .map_err(|reason| io::Error::new(io::ErrorKind::InvalidInput, reason))?;
    Ok(PathBuf::from("/dev/shm").join(bare))
}

/// Remove a named region. Returns `false` when nothing was there.
///
/// Existing mappings stay valid until they are dropped.
pub fn unlink_shared_memory(name: &str) -> io::Result<bool> {
    match std::fs::remove_file(shm_path(name)?) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove `name` only while it still refers to the region mapped by `shm`.
///
/// A creator whose name was taken over by a newer region (a restart under the
/// same name) leaves the newer one alone and returns `false`.
#[cfg(target_os = "linux")]
pub fn unlink_shared_memory_if_same(
    name: &str,
    shm: &dyn SharedMemoryBackend,
) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let path = shm_path(name)?;
    let current = match std::fs::metadata(&path) {
        Ok(meta) => (meta.dev(), meta.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if handle_identity(shm.raw_handle())? != current {
        return Ok(false);
    }
    unlink_shared_memory(name)
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_shared_memory_if_same(
    name: &str,
    _shm: &dyn SharedMemoryBackend,
) -> io::Result<bool> {
    unlink_shared_memory(name)
}

/// Device and inode of the object behind an open handle.
#[cfg(target_os = "linux")]
fn handle_identity(handle: RawHandle) -> io::Result<(u64, u64)> {
    let RawHandle::Fd(fd) = handle;
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut stat) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((stat.st_dev as u64, stat.st_ino as u64))
}

/// Create a fresh, zero-filled region of `size` bytes, readable and writable by
/// the owner only ([`DEFAULT_RESOURCE_MODE`](crate::config::DEFAULT_RESOURCE_MODE)).
#[cfg(target_os = "linux")]
pub fn create_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    create_shared_memory_with_mode(name, size, crate::config::DEFAULT_RESOURCE_MODE)
}

/// Create a fresh, zero-filled region of `size` bytes with permission bits `mode`.
///
/// A stale region left behind by a crashed run is unlinked first; the new one is
/// then created exclusively, so two live creators cannot share a name. `mode` is
/// applied after creation, so the process umask does not narrow it.
#[cfg(target_os = "linux")]
pub fn create_shared_memory_with_mode(
    name: &str,
    size: usize,
    mode: u32,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(name, size, mode)?))
}

/// Attach to an existing region of at least `min_size` bytes.
///
/// The whole file is mapped, so callers that only know a lower bound (the
/// transport header) can discover the real size through [`SharedMemoryBackend::size`].
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(
    name: &str,
    min_size: usize,
    access: Access,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::attach(name, min_size, access)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory_with_mode(
    _name: &str,
    _size: usize,
    _mode: u32,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(
    _name: &str,
    _min_size: usize,
    _access: Access,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    writable: bool,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    pub fn create(name: &str, size: usize, mode: u32) -> io::Result<Self> {
        use std::fs::{OpenOptions, Permissions};
        use std::os::fd::IntoRawFd;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared memory size must be non-zero",
            ));
        }

        let path = shm_path(name)?;
        unlink_shared_memory(name)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(mode & 0o777)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {}", path.display(), e),
                )
            })?;
        file.set_permissions(Permissions::from_mode(mode & 0o777))?;
        file.set_len(size as u64)?;

        let fd = file.into_raw_fd();
        let ptr = unsafe { map_fd(fd, size, true) }?;

        Ok(Self {
            ptr,
            size,
            fd,
            writable: true,
        })
    }

    pub fn attach(name: &str, min_size: usize, access: Access) -> io::Result<Self> {
        use std::fs::OpenOptions;
        use std::os::fd::IntoRawFd;

        let path = shm_path(name)?;
        let writable = access == Access::ReadWrite;
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to open shared memory at {}: {}", path.display(), e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < min_size.max(1) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size too small: expected at least {} bytes, got {}",
                    min_size, file_size
                ),
            ));
        }

        let fd = file.into_raw_fd();
        let ptr = unsafe { map_fd(fd, file_size, writable) }?;

        Ok(Self {
            ptr,
            size: file_size,
            fd,
            writable,
        })
    }
}

/// Map `size` bytes of `fd`; closes `fd` when the mapping fails.
#[cfg(target_os = "linux")]
unsafe fn map_fd(fd: i32, size: usize, writable: bool) -> io::Result<NonNull<u8>> {
    let prot = if writable {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_READ
    };
    let ptr = libc::mmap(std::ptr::null_mut(), size, prot, libc::MAP_SHARED, fd, 0);
    if ptr == libc::MAP_FAILED {
        let err = io::Error::last_os_error();
        libc::close(fd);
        return Err(err);
    }
    match NonNull::new(ptr as *mut u8) {
        Some(ptr) => Ok(ptr),
        None => {
            libc::close(fd);
            Err(io::Error::new(io::ErrorKind::Other, "mmap returned null"))
        }
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}
