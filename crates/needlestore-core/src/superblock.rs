//! The fixed-width header at the start of every volume data file.
//!
//! Layout (8 bytes, matching the needle padding unit so the first needle
//! always starts on an aligned offset):
//! `version(1) ‖ replicaPlacement(1) ‖ ttl(2) ‖ compactionRevision(2) ‖ reserved(2)`.

use needlestore_types::{ReplicaPlacement, Ttl, Version};

use crate::error::NeedlestoreError;

/// Width of the superblock on disk.
pub const SUPER_BLOCK_SIZE: usize = 8;

/// Header written once at the start of a volume data file, read back by
/// [`crate::volume::Volume::open`] and by the scanner's
/// `visitSuperBlock` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub version: Version,
    pub replica_placement: ReplicaPlacement,
    pub ttl: Ttl,
    pub compaction_revision: u16,
}

impl SuperBlock {
    #[must_use]
    pub fn new(version: Version, replica_placement: ReplicaPlacement, ttl: Ttl) -> Self {
        Self {
            version,
            replica_placement,
            ttl,
            compaction_revision: 0,
        }
    }

    /// Bumps the compaction revision, as done each time a volume is
    /// rewritten by compaction.
    #[must_use]
    pub fn with_compaction_revision(mut self, revision: u16) -> Self {
        self.compaction_revision = revision;
        self
    }

    #[must_use]
    pub fn encode(&self) -> [u8; SUPER_BLOCK_SIZE] {
        let mut buf = [0u8; SUPER_BLOCK_SIZE];
        buf[0] = self.version.as_u8();
        buf[1] = self.replica_placement.as_u8();
        needlestore_crypto::primitive::put_u16(&mut buf[2..4], self.ttl.as_u32() as u16);
        needlestore_crypto::primitive::put_u16(&mut buf[4..6], self.compaction_revision);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NeedlestoreError> {
        if bytes.len() < SUPER_BLOCK_SIZE {
            return Err(NeedlestoreError::SuperblockInvalid {
                reason: format!("need {SUPER_BLOCK_SIZE} bytes, got {}", bytes.len()),
            });
        }
        let version = Version::from_u8(bytes[0]).ok_or(NeedlestoreError::UnsupportedVersion(bytes[0]))?;
        let replica_placement = ReplicaPlacement::new(bytes[1]);
        let ttl = Ttl::new(u32::from(needlestore_crypto::primitive::get_u16(&bytes[2..4])));
        let compaction_revision = needlestore_crypto::primitive::get_u16(&bytes[4..6]);
        Ok(Self {
            version,
            replica_placement,
            ttl,
            compaction_revision,
        })
    }
}
