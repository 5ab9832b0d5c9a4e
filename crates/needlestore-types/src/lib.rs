//! # needlestore-types: Shared identifiers and wire newtypes
//!
//! This crate contains the small value types shared between the codec,
//! volume I/O, and replication layers of needlestore:
//! - Identifiers ([`VolumeId`], [`Cookie`], [`NeedleId`])
//! - Format versioning ([`Version`])
//! - The tombstone-aware size field ([`NeedleSize`])
//! - Optional-field presence bits ([`NeedleFlags`])

use std::fmt::{self, Display};

/// Sentinel `size` value marking a needle as a deletion marker.
pub const TOMBSTONE_FILE_SIZE: u32 = 0xFFFF_FFFF;

/// Identifies a volume (and its data/index file pair) within a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumeId(u32);

impl VolumeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VolumeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<VolumeId> for u32 {
    fn from(id: VolumeId) -> Self {
        id.0
    }
}

/// Random per-needle token used to disambiguate id reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cookie(u32);

impl Cookie {
    pub fn new(value: u32) -> Self {
        Self(value)
    }
}

impl From<u32> for Cookie {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Cookie> for u32 {
    fn from(cookie: Cookie) -> Self {
        cookie.0
    }
}

/// Record identity within a volume. Width is fixed at 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NeedleId(u64);

impl NeedleId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl Display for NeedleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NeedleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<NeedleId> for u64 {
    fn from(id: NeedleId) -> Self {
        id.0
    }
}

/// The three on-disk needle format generations.
///
/// `V1` stores a raw data blob, `V2` adds a tagged body with optional
/// fields, `V3` is `V2` plus a trailing append timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2,
    V3,
}

impl Version {
    /// Whether this version carries a trailing `appendAtNs` timestamp.
    pub fn has_timestamp(self) -> bool {
        matches!(self, Version::V3)
    }

    /// Whether this version uses the tagged V2-style body layout.
    pub fn has_tagged_body(self) -> bool {
        matches!(self, Version::V2 | Version::V3)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
            Version::V3 => 3,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Version::V1),
            2 => Some(Version::V2),
            3 => Some(Version::V3),
            _ => None,
        }
    }
}

/// The header `size` field, distinguishing a real body length from the
/// tombstone sentinel.
///
/// Re-architects the source's bare `0xFFFFFFFF`-as-size convention into a
/// type that cannot be mistaken for an ordinary body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeedleSize {
    Data(u32),
    Tombstone,
}

impl NeedleSize {
    /// Length in bytes of the needle body, or 0 for a tombstone.
    pub fn len(self) -> u32 {
        match self {
            NeedleSize::Data(n) => n,
            NeedleSize::Tombstone => 0,
        }
    }

    pub fn is_tombstone(self) -> bool {
        matches!(self, NeedleSize::Tombstone)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl From<u32> for NeedleSize {
    fn from(raw: u32) -> Self {
        if raw == TOMBSTONE_FILE_SIZE {
            NeedleSize::Tombstone
        } else {
            NeedleSize::Data(raw)
        }
    }
}

impl From<NeedleSize> for u32 {
    fn from(size: NeedleSize) -> Self {
        match size {
            NeedleSize::Data(n) => n,
            NeedleSize::Tombstone => TOMBSTONE_FILE_SIZE,
        }
    }
}

/// Bitfield indicating which optional fields a V2/V3 needle body carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct NeedleFlags(u8);

impl NeedleFlags {
    pub const GZIP: u8 = 0x01;
    pub const HAS_NAME: u8 = 0x02;
    pub const HAS_MIME: u8 = 0x04;
    pub const HAS_LAST_MODIFIED: u8 = 0x08;
    pub const HAS_TTL: u8 = 0x10;
    pub const HAS_PAIRS: u8 = 0x20;
    pub const IS_CHUNK_MANIFEST: u8 = 0x80;

    pub fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    fn is_set(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn is_gzipped(self) -> bool {
        self.is_set(Self::GZIP)
    }

    pub fn set_gzipped(&mut self, value: bool) {
        self.set(Self::GZIP, value);
    }

    pub fn has_name(self) -> bool {
        self.is_set(Self::HAS_NAME)
    }

    pub fn set_has_name(&mut self, value: bool) {
        self.set(Self::HAS_NAME, value);
    }

    pub fn has_mime(self) -> bool {
        self.is_set(Self::HAS_MIME)
    }

    pub fn set_has_mime(&mut self, value: bool) {
        self.set(Self::HAS_MIME, value);
    }

    pub fn has_last_modified(self) -> bool {
        self.is_set(Self::HAS_LAST_MODIFIED)
    }

    pub fn set_has_last_modified(&mut self, value: bool) {
        self.set(Self::HAS_LAST_MODIFIED, value);
    }

    pub fn has_ttl(self) -> bool {
        self.is_set(Self::HAS_TTL)
    }

    pub fn set_has_ttl(&mut self, value: bool) {
        self.set(Self::HAS_TTL, value);
    }

    pub fn has_pairs(self) -> bool {
        self.is_set(Self::HAS_PAIRS)
    }

    pub fn set_has_pairs(&mut self, value: bool) {
        self.set(Self::HAS_PAIRS, value);
    }

    pub fn is_chunk_manifest(self) -> bool {
        self.is_set(Self::IS_CHUNK_MANIFEST)
    }

    pub fn set_is_chunk_manifest(&mut self, value: bool) {
        self.set(Self::IS_CHUNK_MANIFEST, value);
    }
}

impl From<u8> for NeedleFlags {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<NeedleFlags> for u8 {
    fn from(flags: NeedleFlags) -> Self {
        flags.0
    }
}

/// A byte offset into a volume's data file, expressed in *padding units*
/// (8-byte strides) the way index file entries store it.
///
/// Index entries are 4 bytes wide, so plain byte offsets (which can exceed
/// `u32::MAX` for large volumes) are divided by [`PADDING_UNIT`] before
/// storage; this type exists so that conversion is never done ad hoc at a
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PaddingOffset(u32);

/// Padding unit in bytes: all needles are padded to a multiple of this.
pub const PADDING_UNIT: u64 = 8;

impl PaddingOffset {
    pub fn new(units: u32) -> Self {
        Self(units)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// The actual byte offset this padding-unit offset denotes.
    pub fn to_actual_offset(self) -> u64 {
        u64::from(self.0) * PADDING_UNIT
    }

    /// Converts an actual byte offset (already a multiple of
    /// [`PADDING_UNIT`]) into a padding-unit offset.
    pub fn from_actual_offset(actual: u64) -> Self {
        Self((actual / PADDING_UNIT) as u32)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Opaque, display-only TTL value carried in a volume's superblock.
///
/// The core treats TTL policy as external (enforcement belongs to
/// compaction/garbage collection, out of scope); this type only needs to
/// round-trip through the superblock and render for
/// `VolumeSyncStatus::ttl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Ttl(u32);

impl Ttl {
    pub const NONE: Ttl = Ttl(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Opaque, display-only replica placement descriptor carried in a volume's
/// superblock. Placement *policy* (how replicas are chosen) is out of
/// scope; this exists only so the superblock can store and render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ReplicaPlacement {
    raw: u8,
}

impl ReplicaPlacement {
    pub fn new(raw: u8) -> Self {
        Self { raw }
    }

    pub fn as_u8(self) -> u8 {
        self.raw
    }
}

impl Display for ReplicaPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.raw)
    }
}

/// Response payload for a volume sync status query (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSyncStatus {
    pub tail_offset: u64,
    pub collection: String,
    pub idx_file_size: u64,
    pub compact_revision: u32,
    pub ttl: String,
    pub replication: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn needle_size_round_trips_tombstone() {
        assert_eq!(NeedleSize::from(TOMBSTONE_FILE_SIZE), NeedleSize::Tombstone);
        assert_eq!(u32::from(NeedleSize::Tombstone), TOMBSTONE_FILE_SIZE);
        assert!(NeedleSize::Tombstone.is_tombstone());
    }

    #[test_case(0 ; "zero body")]
    #[test_case(2 ; "small body")]
    #[test_case(0xFFFF_FFFE ; "largest non-sentinel value")]
    fn needle_size_round_trips_data(raw: u32) {
        let size = NeedleSize::from(raw);
        assert_eq!(size, NeedleSize::Data(raw));
        assert_eq!(u32::from(size), raw);
        assert!(!size.is_tombstone());
    }

    #[test]
    fn flags_accessors_are_independent() {
        let mut flags = NeedleFlags::default();
        flags.set_has_name(true);
        flags.set_has_ttl(true);
        assert!(flags.has_name());
        assert!(flags.has_ttl());
        assert!(!flags.has_mime());
        flags.set_has_name(false);
        assert!(!flags.has_name());
        assert!(flags.has_ttl());
    }

    #[test]
    fn version_round_trips_through_u8() {
        for v in [Version::V1, Version::V2, Version::V3] {
            assert_eq!(Version::from_u8(v.as_u8()), Some(v));
        }
        assert_eq!(Version::from_u8(0), None);
        assert_eq!(Version::from_u8(4), None);
    }

    #[test]
    fn padding_offset_round_trips_actual_offset() {
        let actual = 4096u64;
        let padding = PaddingOffset::from_actual_offset(actual);
        assert_eq!(padding.to_actual_offset(), actual);
        assert_eq!(padding.as_u32(), 512);
    }

    #[test]
    fn padding_offset_zero_is_zero() {
        assert!(PaddingOffset::default().is_zero());
        assert!(!PaddingOffset::new(1).is_zero());
    }

    #[test]
    fn ttl_display_empty_when_none() {
        assert_eq!(Ttl::NONE.to_string(), "");
        assert_eq!(Ttl::new(3600).to_string(), "3600");
    }
}
