//! Reader for a volume's `.idx` file: a flat array of fixed-width entries
//! mapping needle id to its data-file location.
//!
//! Grounded in `kimberlite-storage::index`'s `OffsetIndex` (a fixed-stride
//! on-disk array read by entry number), generalized to the external
//! `id(8) ‖ offsetInPaddingUnits(4) ‖ size(4)` layout this format is
//! required to match bit-for-bit.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use needlestore_types::{NeedleId, NeedleSize, PaddingOffset};

use crate::error::NeedlestoreError;

/// Width of one index entry on disk.
pub const NEEDLE_MAP_ENTRY_SIZE: u64 = 16;

/// One decoded `.idx` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: NeedleId,
    pub offset: PaddingOffset,
    pub size: NeedleSize,
}

impl IndexEntry {
    #[must_use]
    pub fn encode(&self) -> [u8; NEEDLE_MAP_ENTRY_SIZE as usize] {
        let mut buf = [0u8; NEEDLE_MAP_ENTRY_SIZE as usize];
        needlestore_crypto::primitive::put_u64(&mut buf[0..8], self.id.into());
        needlestore_crypto::primitive::put_u32(&mut buf[8..12], self.offset.as_u32());
        needlestore_crypto::primitive::put_u32(&mut buf[12..16], u32::from(self.size));
        buf
    }

    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let id = NeedleId::new(needlestore_crypto::primitive::get_u64(&bytes[0..8]));
        let offset = PaddingOffset::new(needlestore_crypto::primitive::get_u32(&bytes[8..12]));
        let size = NeedleSize::from(needlestore_crypto::primitive::get_u32(&bytes[12..16]));
        Self { id, offset, size }
    }
}

/// A read-only handle onto a `.idx` file, opened and validated once.
///
/// The spec models the index file as "opened read-only per operation,
/// closed at end"; callers that want that exact scoping can construct a
/// fresh `IndexFile::open` for each search and let it drop immediately
/// after.
pub struct IndexFile {
    file: File,
    entry_count: u64,
}

impl IndexFile {
    pub fn open(path: &Path) -> Result<Self, NeedlestoreError> {
        let file = File::open(path).map_err(|e| NeedlestoreError::io("open", e))?;
        let len = file.metadata().map_err(|e| NeedlestoreError::io("stat", e))?.len();
        if len % NEEDLE_MAP_ENTRY_SIZE != 0 {
            return Err(NeedlestoreError::IndexMalformed {
                size: len,
                entry_size: NEEDLE_MAP_ENTRY_SIZE,
            });
        }
        Ok(Self {
            file,
            entry_count: len / NEEDLE_MAP_ENTRY_SIZE,
        })
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Reads the entry at index `m` (0-based).
    pub fn read_entry(&self, m: u64) -> Result<IndexEntry, NeedlestoreError> {
        if m >= self.entry_count {
            return Err(NeedlestoreError::IndexMalformed {
                size: m,
                entry_size: self.entry_count,
            });
        }
        let mut buf = [0u8; NEEDLE_MAP_ENTRY_SIZE as usize];
        self.file
            .read_exact_at(&mut buf, m * NEEDLE_MAP_ENTRY_SIZE)
            .map_err(|e| NeedlestoreError::io("read_at", e))?;
        Ok(IndexEntry::decode(&buf))
    }

    /// Reads the final entry, or `None` if the index is empty.
    pub fn read_last_entry(&self) -> Result<Option<IndexEntry>, NeedlestoreError> {
        if self.entry_count == 0 {
            return Ok(None);
        }
        self.read_entry(self.entry_count - 1).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn entry(id: u64, offset: u32, size: u32) -> IndexEntry {
        IndexEntry {
            id: NeedleId::new(id),
            offset: PaddingOffset::new(offset),
            size: NeedleSize::from(size),
        }
    }

    #[test]
    fn entry_round_trips_through_bytes() {
        let e = entry(42, 7, 1024);
        let bytes = e.encode();
        assert_eq!(bytes.len(), NEEDLE_MAP_ENTRY_SIZE as usize);
        assert_eq!(IndexEntry::decode(&bytes), e);
    }

    #[test]
    fn reads_entries_and_last_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.idx");
        let mut file = File::create(&path).unwrap();
        let entries = [entry(1, 0, 10), entry(2, 10, 20), entry(3, 30, 30)];
        for e in &entries {
            file.write_all(&e.encode()).unwrap();
        }
        drop(file);

        let index = IndexFile::open(&path).unwrap();
        assert_eq!(index.entry_count(), 3);
        assert_eq!(index.read_entry(1).unwrap(), entries[1]);
        assert_eq!(index.read_last_entry().unwrap(), Some(entries[2]));
    }

    #[test]
    fn empty_index_file_has_no_last_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.idx");
        File::create(&path).unwrap();

        let index = IndexFile::open(&path).unwrap();
        assert_eq!(index.entry_count(), 0);
        assert_eq!(index.read_last_entry().unwrap(), None);
    }

    #[test]
    fn malformed_length_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.idx");
        std::fs::write(&path, vec![0u8; 17]).unwrap();

        let err = IndexFile::open(&path).unwrap_err();
        assert!(matches!(err, NeedlestoreError::IndexMalformed { .. }));
    }
}
