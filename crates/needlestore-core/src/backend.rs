//! File I/O abstraction behind a volume's data file.
//!
//! Mirrors `kimberlite-io::backend::IoBackend` — a small trait so the
//! volume layer doesn't care whether bytes move through ordinary
//! read/write syscalls or a memory-mapped view. SeaweedFS keys the mmap
//! decision off a process-wide table of open filenames; here the choice
//! is an explicit collaborator the caller constructs once per volume
//! (see [`FileBackend::open_direct`] / [`FileBackend::open_mapped`]).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::NeedlestoreError;

fn io_err(op: &'static str, source: std::io::Error) -> NeedlestoreError {
    NeedlestoreError::io(op, source)
}

/// Backing store for a volume's data file: either ordinary file I/O or a
/// growable memory-mapped view.
pub enum FileBackend {
    Direct(DirectBackend),
    Mapped(MappedBackend),
}

impl FileBackend {
    /// Opens (creating if absent) `path` for ordinary buffered I/O.
    pub fn open_direct(path: &Path) -> Result<Self, NeedlestoreError> {
        Ok(Self::Direct(DirectBackend::open(path)?))
    }

    /// Opens (creating if absent) `path` backed by a memory-mapped view
    /// that grows as data is appended.
    pub fn open_mapped(path: &Path) -> Result<Self, NeedlestoreError> {
        Ok(Self::Mapped(MappedBackend::open(path)?))
    }

    /// Current length of the file, i.e. the offset the next append lands at.
    pub fn tail_offset(&self) -> u64 {
        match self {
            FileBackend::Direct(b) => b.tail,
            FileBackend::Mapped(b) => b.tail,
        }
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`, without
    /// disturbing any shared file cursor.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), NeedlestoreError> {
        match self {
            FileBackend::Direct(b) => b.read_at(offset, buf),
            FileBackend::Mapped(b) => b.read_at(offset, buf),
        }
    }

    /// Appends `data` at the current tail, returning the offset it was
    /// written at. On failure the backend is left at its pre-call tail.
    pub fn append(&mut self, data: &[u8]) -> Result<u64, NeedlestoreError> {
        match self {
            FileBackend::Direct(b) => b.append(data),
            FileBackend::Mapped(b) => b.append(data),
        }
    }

    /// Truncates the file back to `new_len`, used to roll back a partial append.
    pub fn truncate(&mut self, new_len: u64) -> Result<(), NeedlestoreError> {
        match self {
            FileBackend::Direct(b) => b.truncate(new_len),
            FileBackend::Mapped(b) => b.truncate(new_len),
        }
    }

    /// Flushes any buffered writes and their metadata to stable storage.
    pub fn sync(&self) -> Result<(), NeedlestoreError> {
        match self {
            FileBackend::Direct(b) => b.sync(),
            FileBackend::Mapped(b) => b.sync(),
        }
    }
}

/// Ordinary file I/O: `pread`-style positional reads, append via a single
/// `write_all` at the tracked tail.
pub struct DirectBackend {
    pub(crate) file: File,
    pub(crate) tail: u64,
}

impl DirectBackend {
    fn open(path: &Path) -> Result<Self, NeedlestoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| io_err("open", e))?;
        let tail = file.metadata().map_err(|e| io_err("stat", e))?.len();
        Ok(Self { file, tail })
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), NeedlestoreError> {
        self.file
            .read_exact_at(buf, offset)
            .map_err(|e| io_err("read_at", e))
    }

    fn append(&mut self, data: &[u8]) -> Result<u64, NeedlestoreError> {
        let offset = self.tail;
        match self.file.write_all_at(data, offset) {
            Ok(()) => {
                self.tail += data.len() as u64;
                Ok(offset)
            }
            Err(e) => {
                // Best-effort rollback of whatever partial bytes landed on disk.
                let _ = self.file.set_len(offset);
                Err(NeedlestoreError::AppendRolledBack {
                    cause: e.to_string(),
                })
            }
        }
    }

    fn truncate(&mut self, new_len: u64) -> Result<(), NeedlestoreError> {
        self.file
            .set_len(new_len)
            .map_err(|e| io_err("truncate", e))?;
        self.tail = new_len;
        Ok(())
    }

    fn sync(&self) -> Result<(), NeedlestoreError> {
        self.file.sync_all().map_err(|e| io_err("fsync", e))
    }
}

/// Memory-mapped backing. The mapping is grown (remapped) whenever an
/// append would exceed its current length.
pub struct MappedBackend {
    file: File,
    mmap: memmap2::MmapMut,
    tail: u64,
    capacity: u64,
}

const MAPPED_GROWTH_FACTOR: u64 = 2;
const MAPPED_MIN_CAPACITY: u64 = 64 * 1024;

impl MappedBackend {
    #[allow(unsafe_code)]
    fn open(path: &Path) -> Result<Self, NeedlestoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| io_err("open", e))?;
        let tail = file.metadata().map_err(|e| io_err("stat", e))?.len();
        let capacity = tail.max(MAPPED_MIN_CAPACITY);
        file.set_len(capacity).map_err(|e| io_err("truncate", e))?;
        // SAFETY: `file` is owned by this backend for the mapping's lifetime and
        // not concurrently truncated by any other handle to the same path.
        let mmap = unsafe { memmap2::MmapMut::map_mut(&file) }.map_err(|e| io_err("mmap", e))?;
        Ok(Self {
            file,
            mmap,
            tail,
            capacity,
        })
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), NeedlestoreError> {
        let start = offset as usize;
        let end = start + buf.len();
        if end as u64 > self.tail {
            return Err(NeedlestoreError::io(
                "read_at",
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past mapped tail"),
            ));
        }
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(())
    }

    #[allow(unsafe_code)]
    fn grow_to(&mut self, min_capacity: u64) -> Result<(), NeedlestoreError> {
        let mut new_capacity = self.capacity.max(MAPPED_MIN_CAPACITY);
        while new_capacity < min_capacity {
            new_capacity *= MAPPED_GROWTH_FACTOR;
        }
        self.file
            .set_len(new_capacity)
            .map_err(|e| io_err("truncate", e))?;
        // SAFETY: same invariant as `open` — exclusive ownership of `file`.
        self.mmap = unsafe { memmap2::MmapMut::map_mut(&self.file) }.map_err(|e| io_err("mmap", e))?;
        self.capacity = new_capacity;
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> Result<u64, NeedlestoreError> {
        let offset = self.tail;
        let new_tail = offset + data.len() as u64;
        if new_tail > self.capacity {
            if let Err(e) = self.grow_to(new_tail) {
                return Err(NeedlestoreError::AppendRolledBack {
                    cause: e.to_string(),
                });
            }
        }
        let start = offset as usize;
        let end = new_tail as usize;
        self.mmap[start..end].copy_from_slice(data);
        self.tail = new_tail;
        Ok(offset)
    }

    fn truncate(&mut self, new_len: u64) -> Result<(), NeedlestoreError> {
        self.tail = new_len;
        Ok(())
    }

    fn sync(&self) -> Result<(), NeedlestoreError> {
        self.mmap.flush().map_err(|e| io_err("fsync", e))
    }
}
