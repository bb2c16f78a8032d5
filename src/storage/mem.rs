//! In-memory storage backend.
//!
//! A flat map of named files standing in for the node's RAM filesystem.
//! Descriptors are monotonically increasing and never reused, and every
//! close is counted, so tests can assert release-exactly-once.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use super::{DirEntry, DirFd, Fd, OpenMode, Result, Storage, StorageError};

struct OpenFile {
    name: String,
    pos: usize,
    mode: OpenMode,
}

struct DirCursor {
    entries: Vec<DirEntry>,
    at: usize,
}

#[derive(Default)]
pub struct MemStorage {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    open_files: RefCell<HashMap<Fd, OpenFile>>,
    open_dirs: RefCell<HashMap<DirFd, DirCursor>>,
    next_fd: Cell<Fd>,
    closes: RefCell<HashMap<Fd, u32>>,
    dir_closes: RefCell<HashMap<DirFd, u32>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file, replacing any previous contents.
    pub fn insert_file(&self, name: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(name.to_string(), contents.into());
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    /// How many times `fd` has been closed.
    pub fn close_count(&self, fd: Fd) -> u32 {
        self.closes.borrow().get(&fd).copied().unwrap_or(0)
    }

    /// How many times the directory cursor `dir` has been closed.
    pub fn dir_close_count(&self, dir: DirFd) -> u32 {
        self.dir_closes.borrow().get(&dir).copied().unwrap_or(0)
    }

    /// Number of file descriptors still open.
    pub fn open_file_count(&self) -> usize {
        self.open_files.borrow().len()
    }

    fn alloc_fd(&self) -> Fd {
        let fd = self.next_fd.get();
        self.next_fd.set(fd + 1);
        fd
    }
}

impl Storage for MemStorage {
    fn open(&self, name: &str, mode: OpenMode) -> Result<Fd> {
        let mut files = self.files.borrow_mut();
        let pos = match mode {
            OpenMode::Read => {
                if !files.contains_key(name) {
                    return Err(StorageError::NotFound(name.to_string()));
                }
                0
            }
            OpenMode::Write => {
                files.insert(name.to_string(), Vec::new());
                0
            }
            OpenMode::Append => files.entry(name.to_string()).or_default().len(),
        };
        let fd = self.alloc_fd();
        self.open_files.borrow_mut().insert(
            fd,
            OpenFile {
                name: name.to_string(),
                pos,
                mode,
            },
        );
        Ok(fd)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        let files = self.files.borrow();
        let data = files
            .get(&file.name)
            .ok_or_else(|| StorageError::NotFound(file.name.clone()))?;
        let remaining = data.len().saturating_sub(file.pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data[file.pos..file.pos + n]);
        file.pos += n;
        Ok(n)
    }

    fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        if file.mode == OpenMode::Read {
            return Err(StorageError::Unsupported);
        }
        let mut files = self.files.borrow_mut();
        let data = files.entry(file.name.clone()).or_default();
        if file.pos + buf.len() > data.len() {
            data.resize(file.pos + buf.len(), 0);
        }
        data[file.pos..file.pos + buf.len()].copy_from_slice(buf);
        file.pos += buf.len();
        Ok(buf.len())
    }

    fn seek(&self, fd: Fd, offset: u64) -> Result<u64> {
        let mut open = self.open_files.borrow_mut();
        let file = open.get_mut(&fd).ok_or(StorageError::BadDescriptor)?;
        let len = self
            .files
            .borrow()
            .get(&file.name)
            .map(Vec::len)
            .unwrap_or(0);
        file.pos = (offset as usize).min(len);
        Ok(file.pos as u64)
    }

    fn close(&self, fd: Fd) {
        self.open_files.borrow_mut().remove(&fd);
        *self.closes.borrow_mut().entry(fd).or_insert(0) += 1;
    }

    fn open_dir(&self, path: &str) -> Result<DirFd> {
        // The file map is flat; only the root is a directory.
        if !path.is_empty() && path != "/" {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let entries = self
            .files
            .borrow()
            .iter()
            .map(|(name, data)| DirEntry {
                name: name.clone(),
                size: data.len() as u64,
            })
            .collect();
        let dir = self.alloc_fd();
        self.open_dirs
            .borrow_mut()
            .insert(dir, DirCursor { entries, at: 0 });
        Ok(dir)
    }

    fn read_dir(&self, dir: DirFd) -> Option<DirEntry> {
        let mut dirs = self.open_dirs.borrow_mut();
        let cursor = dirs.get_mut(&dir)?;
        let entry = cursor.entries.get(cursor.at).cloned();
        if entry.is_some() {
            cursor.at += 1;
        }
        entry
    }

    fn close_dir(&self, dir: DirFd) {
        self.open_dirs.borrow_mut().remove(&dir);
        *self.dir_closes.borrow_mut().entry(dir).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_read_missing_file_fails() {
        let storage = MemStorage::new();
        assert!(matches!(
            storage.open("nope", OpenMode::Read),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn write_truncates_existing_contents() {
        let storage = MemStorage::new();
        storage.insert_file("f", b"old contents".to_vec());
        let fd = storage.open("f", OpenMode::Write).unwrap();
        storage.write(fd, b"new").unwrap();
        storage.close(fd);
        assert_eq!(storage.contents("f").unwrap(), b"new");
    }

    #[test]
    fn append_positions_at_end() {
        let storage = MemStorage::new();
        storage.insert_file("f", b"abc".to_vec());
        let fd = storage.open("f", OpenMode::Append).unwrap();
        storage.write(fd, b"def").unwrap();
        storage.close(fd);
        assert_eq!(storage.contents("f").unwrap(), b"abcdef");
    }

    #[test]
    fn read_advances_and_hits_eof() {
        let storage = MemStorage::new();
        storage.insert_file("f", b"hello".to_vec());
        let fd = storage.open("f", OpenMode::Read).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(storage.read(fd, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(storage.read(fd, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(storage.read(fd, &mut buf).unwrap(), 0);
        storage.close(fd);
    }

    #[test]
    fn seek_clamps_to_length() {
        let storage = MemStorage::new();
        storage.insert_file("f", b"hello".to_vec());
        let fd = storage.open("f", OpenMode::Read).unwrap();
        assert_eq!(storage.seek(fd, 2).unwrap(), 2);
        assert_eq!(storage.seek(fd, 100).unwrap(), 5);
        storage.close(fd);
    }

    #[test]
    fn write_to_read_fd_is_rejected() {
        let storage = MemStorage::new();
        storage.insert_file("f", b"x".to_vec());
        let fd = storage.open("f", OpenMode::Read).unwrap();
        assert!(matches!(
            storage.write(fd, b"y"),
            Err(StorageError::Unsupported)
        ));
        storage.close(fd);
    }

    #[test]
    fn dir_cursor_walks_entries_once() {
        let storage = MemStorage::new();
        storage.insert_file("a", vec![0; 10]);
        storage.insert_file("b", vec![0; 20]);
        let dir = storage.open_dir("/").unwrap();
        let first = storage.read_dir(dir).unwrap();
        let second = storage.read_dir(dir).unwrap();
        assert_eq!((first.name.as_str(), first.size), ("a", 10));
        assert_eq!((second.name.as_str(), second.size), ("b", 20));
        assert!(storage.read_dir(dir).is_none());
        assert!(storage.read_dir(dir).is_none());
        storage.close_dir(dir);
    }

    #[test]
    fn open_dir_rejects_non_root() {
        let storage = MemStorage::new();
        assert!(storage.open_dir("/sub").is_err());
    }

    #[test]
    fn descriptors_are_not_reused() {
        let storage = MemStorage::new();
        let a = storage.open("a", OpenMode::Write).unwrap();
        storage.close(a);
        let b = storage.open("b", OpenMode::Write).unwrap();
        assert_ne!(a, b);
        storage.close(b);
        assert_eq!(storage.close_count(a), 1);
        assert_eq!(storage.close_count(b), 1);
    }
}
