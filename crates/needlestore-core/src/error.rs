//! Error types surfaced by the needle codec, volume I/O, and replication engine.

use needlestore_types::NeedleId;

/// Errors produced by `needlestore-core`.
///
/// Mirrors the error table in the spec: one variant per distinct failure
/// mode, carrying enough context to diagnose without re-reading the file.
#[derive(Debug, thiserror::Error)]
pub enum NeedlestoreError {
    /// CRC mismatch on read: the stored checksum does not match the
    /// recomputed checksum over the decoded `data`.
    #[error("needle {id}: CRC mismatch, data on disk is corrupted")]
    Corrupt { id: NeedleId },

    /// The header `size` did not match the size the caller expected.
    #[error(
        "entry not found: offset {offset} found id {found_id} size {found_size}, expected size {expected_size}"
    )]
    SizeMismatch {
        offset: u64,
        found_id: NeedleId,
        found_size: u32,
        expected_size: u32,
    },

    /// The V2/V3 body parser ran past the end of the buffer while decoding
    /// an optional field. `region` identifies which field, numbered 1-7 in
    /// the order the fields are parsed (not by field identity): 1 = data,
    /// 2 = name, 3 = mime, 4 = last-modified, 5 = ttl, 6 = pairs-size,
    /// 7 = pairs-body.
    #[error("index out of range {region}")]
    BoundsOverrun { region: u8 },

    /// Encode/decode was invoked with a version outside {V1, V2, V3}.
    #[error("unsupported version ({0})")]
    UnsupportedVersion(u8),

    /// The `.idx` file length is not a positive multiple of
    /// `NeedleMapEntrySize`.
    #[error("unexpected index file size: {size} (must be a positive multiple of {entry_size})")]
    IndexMalformed { size: u64, entry_size: u64 },

    /// The superblock at the head of a data file failed to parse.
    #[error("invalid superblock: {reason}")]
    SuperblockInvalid { reason: String },

    /// An append failed partway through and the data file was rolled back
    /// to its pre-append length.
    #[error("append rolled back: {cause}")]
    AppendRolledBack { cause: String },

    /// Underlying read/write/seek/stat failure.
    #[error("I/O failed during {op}: {source}")]
    IoFailed {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl NeedlestoreError {
    /// Wraps a `std::io::Error` with the operation that produced it.
    pub fn io(op: &'static str, source: std::io::Error) -> Self {
        Self::IoFailed { op, source }
    }
}
