//! Storage collaborator interface.
//!
//! File commands consume this trait instead of a concrete filesystem. The
//! contract mirrors the node's storage driver: flat open/read/write/seek/
//! close on files, plus a forward-only directory cursor. Two backends ship
//! with the crate: an in-memory map ([`mem::MemStorage`]) and a `std::fs`
//! passthrough ([`host::HostStorage`]).

pub mod host;
pub mod mem;

use std::rc::Rc;

use thiserror::Error;

/// Opaque file descriptor handed out by a [`Storage`] backend.
pub type Fd = i32;

/// Opaque directory cursor handle.
pub type DirFd = i32;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    Read,
    /// Write, truncating; the file is created if absent.
    Write,
    /// Write positioned at the end; the file is created if absent.
    Append,
}

/// One directory entry: a bounded-length name and a size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("bad descriptor")]
    BadDescriptor,
    #[error("operation not supported")]
    Unsupported,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// The abstract file/directory operations file commands call into.
///
/// Descriptors are never shared between command task instances; each task
/// owns what it opens and releases it exactly once (see [`FileGuard`]).
pub trait Storage {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Fd>;
    /// Reads up to `buf.len()` bytes; `Ok(0)` signals end of file.
    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize>;
    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize>;
    fn seek(&self, fd: Fd, offset: u64) -> Result<u64>;
    fn close(&self, fd: Fd);
    fn open_dir(&self, path: &str) -> Result<DirFd>;
    /// Advances the cursor; `None` signals exhaustion. Not restartable.
    fn read_dir(&self, dir: DirFd) -> Option<DirEntry>;
    fn close_dir(&self, dir: DirFd);
}

/// Owns an open file descriptor for the lifetime of one command task.
///
/// Dropping the guard closes the descriptor, so the close happens on every
/// exit path, including a task future torn down mid-stream.
pub struct FileGuard {
    storage: Rc<dyn Storage>,
    fd: Option<Fd>,
}

impl FileGuard {
    pub fn new(storage: Rc<dyn Storage>, fd: Fd) -> Self {
        Self {
            storage,
            fd: Some(fd),
        }
    }

    pub fn fd(&self) -> Fd {
        // Invariant: fd is Some until the guard is consumed by close().
        self.fd.unwrap_or(-1)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.storage.read(self.fd(), buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.storage.write(self.fd(), buf)
    }

    pub fn seek(&self, offset: u64) -> Result<u64> {
        self.storage.seek(self.fd(), offset)
    }

    /// Closes the descriptor now instead of at drop time.
    pub fn close(mut self) {
        if let Some(fd) = self.fd.take() {
            self.storage.close(fd);
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.fd.take() {
            self.storage.close(fd);
        }
    }
}

/// Owns an open directory cursor, closed on drop like [`FileGuard`].
pub struct DirGuard {
    storage: Rc<dyn Storage>,
    dir: Option<DirFd>,
}

impl DirGuard {
    pub fn new(storage: Rc<dyn Storage>, dir: DirFd) -> Self {
        Self {
            storage,
            dir: Some(dir),
        }
    }

    pub fn next_entry(&self) -> Option<DirEntry> {
        self.dir.and_then(|d| self.storage.read_dir(d))
    }

    pub fn close(mut self) {
        if let Some(dir) = self.dir.take() {
            self.storage.close_dir(dir);
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            self.storage.close_dir(dir);
        }
    }
}
