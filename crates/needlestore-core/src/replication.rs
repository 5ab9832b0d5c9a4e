//! Incremental volume-to-volume replication: locate a follower's
//! checkpoint, binary search the leader's index for the first needle
//! strictly newer than it, transfer the trailing byte range verbatim, and
//! rebuild the follower's needle-map by re-scanning the appended region.
//!
//! Grounded in SeaweedFS's `volume_backup.go` (`IncrementalBackup`,
//! `findLastAppendAtNs`/`locateLastAppendEntry`, `BinarySearchByAppendAtNs`,
//! `VolumeFileScanner4GenIdx`). The RPC transport itself is out of scope
//! here (it belongs to whatever calls this crate); a plain byte-chunk
//! iterator stands in for it so the whole sequence can be exercised
//! end-to-end against two on-disk volumes without a network.

use needlestore_types::{NeedleSize, PaddingOffset};

use crate::error::NeedlestoreError;
use crate::index::IndexFile;
use crate::needle::{self, Needle};
use crate::needle_map::NeedleMap;
use crate::scanner::{scan_volume, VolumeVisitor};
use crate::volume::Volume;

/// A follower's replication checkpoint: the `appendAtNs` of its last
/// replicated needle, and the byte offset new bytes should land at (its
/// data file's current tail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub since_ns: u64,
    pub start_from: u64,
}

/// Follower side: determines the checkpoint to request from a leader.
/// An empty index yields `since_ns: 0`, which replicates the whole volume.
pub fn follower_checkpoint(volume: &Volume, index: &IndexFile) -> Result<Checkpoint, NeedlestoreError> {
    let start_from = volume.tail_offset();
    let since_ns = match index.read_last_entry()? {
        None => 0,
        Some(entry) => read_needle_append_at_ns(volume, entry.offset.to_actual_offset(), entry.size)?,
    };
    tracing::debug!(since_ns, start_from, "determined follower replication checkpoint");
    Ok(Checkpoint { since_ns, start_from })
}

/// Leader side: binary searches `index` for the first entry whose needle
/// has `appendAtNs > since_ns`. `None` means every entry is already
/// `<= since_ns` — the follower is current and nothing needs to transfer.
pub fn binary_search_by_append_at_ns(
    volume: &Volume,
    index: &IndexFile,
    since_ns: u64,
) -> Result<Option<PaddingOffset>, NeedlestoreError> {
    let entry_count = index.entry_count();
    let mut low = 0u64;
    let mut high = entry_count;

    while low < high {
        let mid = low + (high - low) / 2;
        if mid == entry_count {
            return Ok(None);
        }
        let entry = index.read_entry(mid)?;
        let mid_ns = read_needle_append_at_ns(volume, entry.offset.to_actual_offset(), entry.size)?;

        if mid_ns <= since_ns {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    if low == entry_count {
        return Ok(None);
    }
    Ok(Some(index.read_entry(low)?.offset))
}

/// Reads just enough of the needle at `offset` to recover its
/// `appendAtNs`, without validating its checksum — mirrors
/// `readAppendAtNs`/`ReadNeedleBody` in the source.
fn read_needle_append_at_ns(volume: &Volume, offset: u64, size: NeedleSize) -> Result<u64, NeedlestoreError> {
    let total = needle::actual_size(size.len(), volume.version());
    let bytes = volume.read_raw(offset, total as usize)?;
    Ok(needle::read_append_at_ns(&bytes, size, volume.version()))
}

/// Leader side, local variant of the transfer step: locates the first
/// needle newer than `since_ns` and returns the raw byte range
/// `[offset, EOF)` a real RPC would stream to the follower.
pub fn leader_incremental_bytes(
    leader: &Volume,
    leader_index: &IndexFile,
    since_ns: u64,
) -> Result<Vec<u8>, NeedlestoreError> {
    let Some(offset) = binary_search_by_append_at_ns(leader, leader_index, since_ns)? else {
        return Ok(Vec::new());
    };
    let start = offset.to_actual_offset();
    let tail = leader.tail_offset();
    if start >= tail {
        return Ok(Vec::new());
    }
    leader.read_raw(start, (tail - start) as usize)
}

/// Follower side: appends a stream of already-encoded byte chunks
/// verbatim at the follower's current tail. Chunk boundaries need not
/// align to needle boundaries; only the concatenation matters. Any error
/// aborts replication with its cause, leaving whatever was already
/// applied in place — resuming is just a matter of re-running
/// [`follower_checkpoint`].
pub fn apply_incremental_chunks(
    follower: &Volume,
    chunks: impl IntoIterator<Item = Result<Vec<u8>, NeedlestoreError>>,
) -> Result<(), NeedlestoreError> {
    for chunk in chunks {
        let chunk = chunk?;
        follower.append_raw(&chunk)?;
    }
    Ok(())
}

/// Follower side: rebuilds needle-map entries for the region
/// `[start_from, tail)` by scanning headers only (no bodies, no checksum
/// validation — a pure header pass over whatever was just appended).
/// Returns the tail the scan reached.
///
/// Mirrors `VolumeFileScanner4GenIdx.VisitNeedle`: a real (non-zero,
/// non-tombstone) size is `put`; anything else — including `size == 0`,
/// preserved verbatim even though it reads oddly for a genuinely empty
/// body — is `delete`d.
pub fn reindex_from(
    follower: &Volume,
    start_from: u64,
    needle_map: &mut impl NeedleMap,
) -> Result<u64, NeedlestoreError> {
    let mut visitor = ReindexVisitor { needle_map };
    let new_tail = scan_volume(follower, start_from, &mut visitor)?;
    tracing::info!(start_from, new_tail, "rebuilt needle-map from replicated bytes");
    Ok(new_tail)
}

struct ReindexVisitor<'a, M: NeedleMap> {
    needle_map: &'a mut M,
}

impl<'a, M: NeedleMap> VolumeVisitor for ReindexVisitor<'a, M> {
    fn read_needle_body(&self) -> bool {
        false
    }

    fn visit_needle(&mut self, needle: &Needle, size: NeedleSize, offset: u64) -> Result<(), NeedlestoreError> {
        let padding_offset = PaddingOffset::from_actual_offset(offset);
        match size {
            NeedleSize::Data(n) if n > 0 => self.needle_map.put(needle.id, padding_offset, size),
            _ => self.needle_map.delete(needle.id, padding_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use needlestore_types::{Cookie, NeedleId};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    use crate::index::IndexEntry;
    use crate::needle_map::{InMemoryNeedleMap, NeedleMap};
    use crate::volume::VolumeOptions;

    /// Appends `needle` to `volume` and writes the matching entry to the
    /// `.idx` file at `index_path`, the way a real needle-map's `Put`
    /// would when called from the normal (non-replication) append path.
    fn append_and_index(
        volume: &Volume,
        index_path: &std::path::Path,
        needle: &Needle,
        append_at_ns: u64,
    ) -> IndexEntry {
        let (offset, size) = volume.append(needle, append_at_ns).unwrap();
        let entry = IndexEntry {
            id: needle.id,
            offset,
            size,
        };
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(index_path).unwrap();
        file.write_all(&entry.encode()).unwrap();
        entry
    }

    #[test]
    fn follower_checkpoint_is_zero_for_an_empty_index() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("1.dat");
        let index_path = dir.path().join("1.idx");
        File::create(&index_path).unwrap();

        let volume = Volume::create(&data_path, VolumeOptions::default()).unwrap();
        let index = IndexFile::open(&index_path).unwrap();

        let checkpoint = follower_checkpoint(&volume, &index).unwrap();
        assert_eq!(checkpoint.since_ns, 0);
        assert_eq!(checkpoint.start_from, volume.tail_offset());
    }

    #[test]
    fn binary_search_finds_first_entry_strictly_newer_than_since_ns() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("1.dat");
        let index_path = dir.path().join("1.idx");
        File::create(&index_path).unwrap();

        let volume = Volume::create(&data_path, VolumeOptions::default()).unwrap();
        let n1 = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"a"));
        let n2 = Needle::new_data(Cookie::new(1), NeedleId::new(2), Bytes::from_static(b"b"));
        let n3 = Needle::new_data(Cookie::new(1), NeedleId::new(3), Bytes::from_static(b"c"));
        append_and_index(&volume, &index_path, &n1, 10);
        let e2 = append_and_index(&volume, &index_path, &n2, 20);
        append_and_index(&volume, &index_path, &n3, 30);

        let index = IndexFile::open(&index_path).unwrap();

        // Strictly between n1 and n2's timestamps: first match is n2.
        let found = binary_search_by_append_at_ns(&volume, &index, 15).unwrap();
        assert_eq!(found, Some(e2.offset));

        // Exactly n2's timestamp: n2 itself is not "strictly newer", so n3 matches.
        let found = binary_search_by_append_at_ns(&volume, &index, 20).unwrap();
        assert_ne!(found, Some(e2.offset));

        // Newer than everything: no match.
        let found = binary_search_by_append_at_ns(&volume, &index, 1000).unwrap();
        assert_eq!(found, None);

        // Older than everything: first entry matches.
        let found = binary_search_by_append_at_ns(&volume, &index, 0).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn full_incremental_replication_round_trip_rebuilds_needle_map() {
        let dir = tempdir().unwrap();
        let leader_data = dir.path().join("leader.dat");
        let leader_index = dir.path().join("leader.idx");
        File::create(&leader_index).unwrap();

        let leader = Volume::create(&leader_data, VolumeOptions::default()).unwrap();
        let n1 = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"one"));
        let n2 = Needle::new_data(Cookie::new(1), NeedleId::new(2), Bytes::from_static(b"two"));
        append_and_index(&leader, &leader_index, &n1, 100);
        append_and_index(&leader, &leader_index, &n2, 200);
        let leader_index_file = IndexFile::open(&leader_index).unwrap();

        let follower_data = dir.path().join("follower.dat");
        let follower_index = dir.path().join("follower.idx");
        File::create(&follower_index).unwrap();
        let follower = Volume::create(&follower_data, VolumeOptions::default()).unwrap();
        let follower_index_file = IndexFile::open(&follower_index).unwrap();

        let checkpoint = follower_checkpoint(&follower, &follower_index_file).unwrap();
        assert_eq!(checkpoint.since_ns, 0);

        let bytes = leader_incremental_bytes(&leader, &leader_index_file, checkpoint.since_ns).unwrap();
        assert!(!bytes.is_empty());

        apply_incremental_chunks(&follower, [Ok(bytes)]).unwrap();

        let mut needle_map = InMemoryNeedleMap::new();
        reindex_from(&follower, checkpoint.start_from, &mut needle_map).unwrap();

        assert_eq!(needle_map.len(), 2);
        assert!(needle_map.get(NeedleId::new(1)).is_some());
        assert!(needle_map.get(NeedleId::new(2)).is_some());
        assert_eq!(follower.tail_offset(), leader.tail_offset());
    }

    #[test]
    fn reindex_deletes_tombstoned_needles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();

        let data = Needle::new_data(Cookie::new(1), NeedleId::new(5), Bytes::from_static(b"payload"));
        volume.append(&data, 1).unwrap();
        let tombstone = Needle::new_tombstone(Cookie::new(1), NeedleId::new(5));
        volume.append(&tombstone, 2).unwrap();

        let mut needle_map = InMemoryNeedleMap::new();
        needle_map
            .put(NeedleId::new(5), PaddingOffset::new(0), NeedleSize::from(7))
            .unwrap();

        reindex_from(&volume, 0, &mut needle_map).unwrap();

        assert!(needle_map.get(NeedleId::new(5)).is_none());
    }
}
