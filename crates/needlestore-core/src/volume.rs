//! Append-only volume: a data file fronted by a superblock, a write lock,
//! and positional reads.
//!
//! Grounded in `kimberlite-storage::Storage`'s segment-log shape (a
//! single write mutex guarding append, a tail offset tracked alongside
//! the file) but built on [`FileBackend`] instead of bare `std::fs::File`
//! so the memory-mapped path is just another backend.
//!
//! Reads are served through an [`RwLock`] rather than the bare mutex the
//! spec describes: many concurrent positional reads can proceed at once
//! (matching the "reads don't contend with each other" intent) while
//! still ruling out, in safe Rust, a reader observing a torn mapping
//! mid-remap during an append-triggered grow.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use needlestore_types::{NeedleSize, PaddingOffset, ReplicaPlacement, Ttl, Version, VolumeSyncStatus};

use crate::backend::FileBackend;
use crate::error::NeedlestoreError;
use crate::needle::{actual_size, Needle};
use crate::needle_map::NeedleMap;
use crate::superblock::{SuperBlock, SUPER_BLOCK_SIZE};

/// Construction-time knobs for a volume, analogous to
/// `Storage::with_checkpoint_policy`/`with_max_segment_size`.
#[derive(Debug, Clone, Copy)]
pub struct VolumeOptions {
    /// Needle format version used for every append. Existing needles of
    /// any version already on disk are still read correctly.
    pub version: Version,
    /// Whether the data file is backed by a memory-mapped view.
    pub mapped: bool,
    pub replica_placement: ReplicaPlacement,
    pub ttl: Ttl,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            version: Version::V3,
            mapped: false,
            replica_placement: ReplicaPlacement::default(),
            ttl: Ttl::NONE,
        }
    }
}

/// A single data-file/superblock pair. Callers own the index file and the
/// needle-map separately (see [`crate::index`] and [`crate::replication`]).
pub struct Volume {
    path: PathBuf,
    version: Version,
    superblock: SuperBlock,
    data: RwLock<FileBackend>,
}

impl Volume {
    /// Creates a brand new volume at `path`, writing a fresh superblock.
    /// Fails if the file already has content.
    pub fn create(path: &Path, options: VolumeOptions) -> Result<Self, NeedlestoreError> {
        let mut backend = if options.mapped {
            FileBackend::open_mapped(path)?
        } else {
            FileBackend::open_direct(path)?
        };
        if backend.tail_offset() != 0 {
            return Err(NeedlestoreError::SuperblockInvalid {
                reason: format!("{} already has content, refusing to overwrite", path.display()),
            });
        }
        let superblock = SuperBlock::new(options.version, options.replica_placement, options.ttl);
        backend.append(&superblock.encode())?;
        backend.sync()?;

        Ok(Self {
            path: path.to_path_buf(),
            version: options.version,
            superblock,
            data: RwLock::new(backend),
        })
    }

    /// Opens an existing volume, reading and validating its superblock.
    pub fn open(path: &Path, mapped: bool) -> Result<Self, NeedlestoreError> {
        let backend = if mapped {
            FileBackend::open_mapped(path)?
        } else {
            FileBackend::open_direct(path)?
        };
        if backend.tail_offset() < SUPER_BLOCK_SIZE as u64 {
            return Err(NeedlestoreError::SuperblockInvalid {
                reason: format!("{} is too short to contain a superblock", path.display()),
            });
        }
        let mut header = [0u8; SUPER_BLOCK_SIZE];
        backend.read_at(0, &mut header)?;
        let superblock = SuperBlock::decode(&header)?;

        Ok(Self {
            path: path.to_path_buf(),
            version: superblock.version,
            superblock,
            data: RwLock::new(backend),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn superblock(&self) -> SuperBlock {
        self.superblock
    }

    /// Current length of the data file; the offset the next append lands at.
    pub fn tail_offset(&self) -> u64 {
        self.rlock().tail_offset()
    }

    /// Encodes and appends `needle`, stamping it with `append_at_ns`.
    ///
    /// Returns the padding-unit offset the needle's header landed at (for
    /// the caller to record in the index file) and the header `size`
    /// value that must be passed back to [`Volume::read`].
    pub fn append(
        &self,
        needle: &Needle,
        append_at_ns: u64,
    ) -> Result<(PaddingOffset, NeedleSize), NeedlestoreError> {
        let (bytes, header_size, _total) = needle.encode(self.version, append_at_ns)?;
        let mut backend = self.wlock();
        let offset = backend.append(&bytes)?;
        Ok((PaddingOffset::from_actual_offset(offset), header_size))
    }

    /// Reads back the needle at `offset`, whose header is expected to
    /// record `expected_size`. Does not take the append lock.
    pub fn read(&self, offset: PaddingOffset, expected_size: NeedleSize) -> Result<Needle, NeedlestoreError> {
        let actual_offset = offset.to_actual_offset();
        let total = actual_size(expected_size.len(), self.version);

        let mut buf = vec![0u8; total as usize];
        self.rlock().read_at(actual_offset, &mut buf)?;

        Needle::decode(&buf, actual_offset, self.version, expected_size)
    }

    /// Reads the raw byte range `[from, tail)`, used by the replication
    /// follower to apply a leader's unaligned byte stream and by the
    /// scanner to pull a chunk to parse.
    pub fn read_raw(&self, from: u64, len: usize) -> Result<Vec<u8>, NeedlestoreError> {
        let mut buf = vec![0u8; len];
        self.rlock().read_at(from, &mut buf)?;
        Ok(buf)
    }

    /// Appends a raw byte range as-is (used by the replication follower,
    /// which receives already-encoded needle bytes from the leader).
    pub fn append_raw(&self, bytes: &[u8]) -> Result<u64, NeedlestoreError> {
        self.wlock().append(bytes)
    }

    /// Builds a volume sync status response. Takes the write lock for the
    /// tail offset read, the same way `GetVolumeSyncStatus` does in the
    /// source, so it can never observe a tail mid-append.
    pub fn sync_status(&self, collection: impl Into<String>, needle_map: &impl NeedleMap) -> VolumeSyncStatus {
        let tail_offset = self.wlock().tail_offset();
        VolumeSyncStatus {
            tail_offset,
            collection: collection.into(),
            idx_file_size: needle_map.index_file_size(),
            compact_revision: u32::from(self.superblock.compaction_revision),
            ttl: self.superblock.ttl.to_string(),
            replication: self.superblock.replica_placement.to_string(),
        }
    }

    fn rlock(&self) -> std::sync::RwLockReadGuard<'_, FileBackend> {
        self.data.read().expect("volume data lock poisoned")
    }

    fn wlock(&self) -> std::sync::RwLockWriteGuard<'_, FileBackend> {
        self.data.write().expect("volume data lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use needlestore_types::{Cookie, NeedleId};
    use tempfile::tempdir;

    use crate::needle_map::InMemoryNeedleMap;

    #[test]
    fn create_then_open_round_trips_superblock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let options = VolumeOptions {
            version: Version::V2,
            ..VolumeOptions::default()
        };
        {
            let volume = Volume::create(&path, options).unwrap();
            assert_eq!(volume.tail_offset(), SUPER_BLOCK_SIZE as u64);
        }
        let reopened = Volume::open(&path, false).unwrap();
        assert_eq!(reopened.version(), Version::V2);
    }

    #[test]
    fn append_then_read_round_trips_needle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();

        let needle = Needle::new_data(Cookie::new(1), NeedleId::new(42), Bytes::from_static(b"payload"));
        let (offset, size) = volume.append(&needle, 1000).unwrap();
        assert!(!offset.is_zero());

        let read_back = volume.read(offset, size).unwrap();
        assert_eq!(read_back.id, needle.id);
        assert_eq!(read_back.data(), needle.data());
        assert_eq!(read_back.append_at_ns, 1000);
    }

    #[test]
    fn create_refuses_to_overwrite_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        Volume::create(&path, VolumeOptions::default()).unwrap();
        let err = Volume::create(&path, VolumeOptions::default()).unwrap_err();
        assert!(matches!(err, NeedlestoreError::SuperblockInvalid { .. }));
    }

    #[test]
    fn append_rollback_on_simulated_failure_leaves_tail_unchanged() {
        use crate::backend::DirectBackend;

        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();
        let tail_before = volume.tail_offset();

        // Swap the volume's backend for one whose file handle can't be
        // written to, forcing the next append to fail mid-write the way a
        // real disk-full or I/O error would, without corrupting the file.
        let read_only = std::fs::OpenOptions::new().read(true).open(&path).unwrap();
        *volume.data.write().unwrap() = FileBackend::Direct(DirectBackend {
            file: read_only,
            tail: tail_before,
        });

        let needle = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"ok"));
        let err = volume.append(&needle, 1).unwrap_err();
        assert!(matches!(err, NeedlestoreError::AppendRolledBack { .. }));
        assert_eq!(volume.tail_offset(), tail_before);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), tail_before);

        // Swap back a healthy, writable backend: re-appending the same
        // needle lands at the same offset the failed attempt targeted.
        let writable = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        *volume.data.write().unwrap() = FileBackend::Direct(DirectBackend {
            file: writable,
            tail: tail_before,
        });
        let (offset, _size) = volume.append(&needle, 1).unwrap();
        assert_eq!(offset.to_actual_offset(), tail_before);
    }

    #[test]
    fn sync_status_reports_current_tail_and_superblock_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();
        let needle = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"ok"));
        volume.append(&needle, 1).unwrap();

        let needle_map = InMemoryNeedleMap::new();
        let status = volume.sync_status("test_collection", &needle_map);

        assert_eq!(status.tail_offset, volume.tail_offset());
        assert_eq!(status.collection, "test_collection");
        assert_eq!(status.idx_file_size, needle_map.index_file_size());
        assert_eq!(status.compact_revision, 0);
    }
}
