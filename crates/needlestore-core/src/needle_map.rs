//! The needle-map interface this crate consumes but never owns: a lookup
//! structure from needle id to its on-disk location, kept and persisted
//! entirely by the caller. The replication engine only ever calls
//! [`NeedleMap::put`]/[`NeedleMap::delete`] while rebuilding a follower's
//! map after applying a byte range, and reads [`NeedleMap::index_file_size`]
//! to populate a volume's sync status response.
//!
//! Grounded in the narrow-trait-boundary style `kimberlite-storage` uses
//! for its own index/checkpoint collaborators: a small trait plus one
//! reference implementation good enough for tests and local tooling.

use std::collections::HashMap;

use needlestore_types::{NeedleId, NeedleSize, PaddingOffset};

use crate::error::NeedlestoreError;
use crate::index::NEEDLE_MAP_ENTRY_SIZE;

/// Lookup structure from needle id to its on-disk location.
pub trait NeedleMap {
    /// Records (or overwrites) `id`'s location.
    fn put(&mut self, id: NeedleId, offset: PaddingOffset, size: NeedleSize) -> Result<(), NeedlestoreError>;

    /// Marks `id` as deleted. `offset` is the tombstone's own location,
    /// not the location being removed — implementations that don't care
    /// about tombstone provenance are free to ignore it.
    fn delete(&mut self, id: NeedleId, offset: PaddingOffset) -> Result<(), NeedlestoreError>;

    /// Size, in bytes, of this map's on-disk representation (used only to
    /// populate a sync status response; an in-memory-only implementation
    /// may report an estimate).
    fn index_file_size(&self) -> u64;
}

/// Reference in-memory [`NeedleMap`]. Sufficient for tests and the CLI's
/// local replication demo; not suitable for production use since it has
/// no persistence of its own.
#[derive(Debug, Default)]
pub struct InMemoryNeedleMap {
    entries: HashMap<NeedleId, (PaddingOffset, NeedleSize)>,
}

impl InMemoryNeedleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: NeedleId) -> Option<(PaddingOffset, NeedleSize)> {
        self.entries.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NeedleMap for InMemoryNeedleMap {
    fn put(&mut self, id: NeedleId, offset: PaddingOffset, size: NeedleSize) -> Result<(), NeedlestoreError> {
        self.entries.insert(id, (offset, size));
        Ok(())
    }

    fn delete(&mut self, id: NeedleId, _offset: PaddingOffset) -> Result<(), NeedlestoreError> {
        self.entries.remove(&id);
        Ok(())
    }

    fn index_file_size(&self) -> u64 {
        self.entries.len() as u64 * NEEDLE_MAP_ENTRY_SIZE
    }
}
