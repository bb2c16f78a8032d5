//! Host filesystem backend.
//!
//! Maps the storage contract onto `std::fs`, with every name resolved
//! under a root directory. Used by the binary when `--host-fs` is given.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::{DirEntry, DirFd, Fd, OpenMode, Result, Storage, StorageError};

pub struct HostStorage {
    root: PathBuf,
    open_files: RefCell<HashMap<Fd, File>>,
    open_dirs: RefCell<HashMap<DirFd, std::vec::IntoIter<DirEntry>>>,
    next_fd: Cell<Fd>,
}

impl HostStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open_files: RefCell::new(HashMap::new()),
            open_dirs: RefCell::new(HashMap::new()),
            next_fd: Cell::new(0),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }

    fn alloc_fd(&self) -> Fd {
        let fd = self.next_fd.get();
        self.next_fd.set(fd + 1);
        fd
    }
}

impl Storage for HostStorage {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Fd> {
        let path = self.resolve(name);
        let file = match mode {
            OpenMode::Read => File::open(&path)
                .map_err(|_| StorageError::NotFound(name.to_string()))?,
            OpenMode::Write => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?,
            OpenMode::Append => OpenOptions::new()
                .write(true)
                .create(true)
                .append(true)
                .open(&path)?,
        };
        let fd = self.alloc_fd();
        self.open_files.borrow_mut().insert(fd, file);
        Ok(fd)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        Ok(file.read(buf)?)
    }

    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        Ok(file.write(buf)?)
    }

    fn seek(&self, fd: Fd, offset: u64) -> Result<u64> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        Ok(file.seek(SeekFrom::Start(offset))?)
    }

    fn close(&self, fd: Fd) {
        self.open_files.borrow_mut().remove(&fd);
    }

    fn open_dir(&self, path: &str) -> Result<DirFd> {
        let resolved = self.resolve(path);
        let read = std::fs::read_dir(&resolved)
            .map_err(|_| StorageError::NotFound(path.to_string()))?;
        let mut entries: Vec<DirEntry> = read
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                e.metadata().ok().map(|m| DirEntry {
                    name,
                    size: m.len(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let dir = self.alloc_fd();
        self.open_dirs.borrow_mut().insert(dir, entries.into_iter());
        Ok(dir)
    }

    fn read_dir(&self, dir: DirFd) -> Option<DirEntry> {
        self.open_dirs.borrow_mut().get_mut(&dir)?.next()
    }

    fn close_dir(&self, dir: DirFd) {
        self.open_dirs.borrow_mut().remove(&dir);
    }
}
