//! Replicate command - drive a local leader -> follower replication pass
//! between two on-disk volumes, without a network transport.
//!
//! Mirrors the sequence in `needlestore_core::replication`: determine the
//! follower's checkpoint, binary search the leader's index, transfer the
//! trailing byte range, and re-scan the follower to rebuild its needle-map.

use std::path::Path;

use anyhow::{Context, Result};
use needlestore_core::index::IndexFile;
use needlestore_core::needle_map::InMemoryNeedleMap;
use needlestore_core::replication::{apply_incremental_chunks, follower_checkpoint, leader_incremental_bytes, reindex_from};
use needlestore_core::volume::Volume;

pub fn run(leader_data: &Path, leader_index: &Path, follower_data: &Path, follower_index: &Path) -> Result<()> {
    let leader = Volume::open(leader_data, false)
        .with_context(|| format!("failed to open leader volume at {}", leader_data.display()))?;
    let leader_idx = IndexFile::open(leader_index)
        .with_context(|| format!("failed to open leader index at {}", leader_index.display()))?;
    let follower = Volume::open(follower_data, false)
        .with_context(|| format!("failed to open follower volume at {}", follower_data.display()))?;
    let follower_idx = IndexFile::open(follower_index)
        .with_context(|| format!("failed to open follower index at {}", follower_index.display()))?;

    let checkpoint = follower_checkpoint(&follower, &follower_idx)?;
    println!("follower checkpoint: since_ns={} start_from={}", checkpoint.since_ns, checkpoint.start_from);

    let bytes = leader_incremental_bytes(&leader, &leader_idx, checkpoint.since_ns)?;
    println!("transferring {} bytes from leader", bytes.len());
    if bytes.is_empty() {
        println!("follower already current, nothing to do");
        return Ok(());
    }

    apply_incremental_chunks(&follower, [Ok(bytes)])?;

    let mut needle_map = InMemoryNeedleMap::new();
    let new_tail = reindex_from(&follower, checkpoint.start_from, &mut needle_map)?;

    println!("follower tail now {new_tail}");
    println!("re-indexed {} needle-map entries from the replicated range", needle_map.len());
    Ok(())
}
