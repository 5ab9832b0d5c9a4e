//! Walks a data file from a starting offset to its tail, invoking a
//! visitor for the superblock (if starting from the very beginning) and
//! for each needle header encountered.
//!
//! Grounded in SeaweedFS's `ScanVolumeFileFrom`/`VolumeFileScanner` pair
//! (`volume_backup.go`'s `VolumeFileScanner4GenIdx` is the concrete
//! visitor used to rebuild a needle-map after replication), re-expressed
//! as a plain trait rather than the source's interface value plus a
//! free-standing `ScanVolumeFile` function.

use needlestore_types::NeedleSize;

use crate::error::NeedlestoreError;
use crate::needle::{self, Needle, NEEDLE_HEADER_SIZE};
use crate::superblock::{SuperBlock, SUPER_BLOCK_SIZE};
use crate::volume::Volume;

/// Callback contract driven by [`scan_volume`].
pub trait VolumeVisitor {
    /// Invoked once, only when the scan starts at offset 0.
    fn visit_super_block(&mut self, superblock: SuperBlock) -> Result<(), NeedlestoreError> {
        let _ = superblock;
        Ok(())
    }

    /// Checked once before each needle: whether the scanner should decode
    /// the full body (and validate its checksum) or just the header.
    fn read_needle_body(&self) -> bool;

    /// Invoked for each needle in file order. `offset` is the byte
    /// position of its header. `size` is the header's `size` field,
    /// always populated even when [`Self::read_needle_body`] is `false`
    /// (in which case `needle`'s data/flags/optional fields are empty
    /// placeholders, not the real body).
    fn visit_needle(&mut self, needle: &Needle, size: NeedleSize, offset: u64) -> Result<(), NeedlestoreError>;
}

/// Scans `volume`'s data file from `from_offset` up to its tail at the
/// moment the scan starts, driving `visitor`. Returns the offset the scan
/// stopped at (the tail it observed).
pub fn scan_volume(
    volume: &Volume,
    from_offset: u64,
    visitor: &mut dyn VolumeVisitor,
) -> Result<u64, NeedlestoreError> {
    let version = volume.version();

    if from_offset == 0 {
        visitor.visit_super_block(volume.superblock())?;
    }

    let mut offset = from_offset.max(SUPER_BLOCK_SIZE as u64);
    let tail = volume.tail_offset();

    while offset < tail {
        let header_bytes = volume.read_raw(offset, NEEDLE_HEADER_SIZE as usize)?;
        let (cookie, id, size) = Needle::parse_header(&header_bytes);
        let total = needle::actual_size(size.len(), version);

        let scanned = if visitor.read_needle_body() {
            let full = volume.read_raw(offset, total as usize)?;
            Needle::decode(&full, offset, version, size)?
        } else {
            Needle::header_only(cookie, id, size)
        };

        visitor.visit_needle(&scanned, size, offset)?;
        offset += total;
    }

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use needlestore_types::{Cookie, NeedleId, Version};
    use tempfile::tempdir;

    use crate::volume::VolumeOptions;

    struct Recording {
        read_bodies: bool,
        saw_super_block: bool,
        seen: Vec<(u64, NeedleId, NeedleSize)>,
    }

    impl VolumeVisitor for Recording {
        fn visit_super_block(&mut self, _superblock: SuperBlock) -> Result<(), NeedlestoreError> {
            self.saw_super_block = true;
            Ok(())
        }

        fn read_needle_body(&self) -> bool {
            self.read_bodies
        }

        fn visit_needle(&mut self, needle: &Needle, size: NeedleSize, offset: u64) -> Result<(), NeedlestoreError> {
            self.seen.push((offset, needle.id, size));
            Ok(())
        }
    }

    #[test]
    fn scan_from_zero_visits_superblock_once_and_every_needle_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();

        let first = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"one"));
        let second = Needle::new_data(Cookie::new(1), NeedleId::new(2), Bytes::from_static(b"two"));
        let (offset1, size1) = volume.append(&first, 10).unwrap();
        let (offset2, size2) = volume.append(&second, 20).unwrap();

        let mut visitor = Recording {
            read_bodies: false,
            saw_super_block: false,
            seen: Vec::new(),
        };
        let new_tail = scan_volume(&volume, 0, &mut visitor).unwrap();

        assert!(visitor.saw_super_block);
        assert_eq!(
            visitor.seen,
            vec![
                (offset1.to_actual_offset(), NeedleId::new(1), size1),
                (offset2.to_actual_offset(), NeedleId::new(2), size2),
            ]
        );
        assert_eq!(new_tail, volume.tail_offset());
    }

    #[test]
    fn scan_mid_file_does_not_revisit_superblock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();

        let first = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"one"));
        let (_offset, _size) = volume.append(&first, 10).unwrap();
        let resume_from = volume.tail_offset();

        let second = Needle::new_data(Cookie::new(1), NeedleId::new(2), Bytes::from_static(b"two"));
        let (offset2, size2) = volume.append(&second, 20).unwrap();

        let mut visitor = Recording {
            read_bodies: true,
            saw_super_block: false,
            seen: Vec::new(),
        };
        scan_volume(&volume, resume_from, &mut visitor).unwrap();

        assert!(!visitor.saw_super_block);
        assert_eq!(visitor.seen, vec![(offset2.to_actual_offset(), NeedleId::new(2), size2)]);
    }

    #[test]
    fn scan_with_bodies_decodes_full_needle_including_tombstone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let volume = Volume::create(&path, VolumeOptions::default()).unwrap();

        let tombstone = Needle::new_tombstone(Cookie::new(1), NeedleId::new(9));
        volume.append(&tombstone, 5).unwrap();

        let mut visitor = Recording {
            read_bodies: true,
            saw_super_block: false,
            seen: Vec::new(),
        };
        scan_volume(&volume, 0, &mut visitor).unwrap();

        assert_eq!(visitor.seen.len(), 1);
        let (_, _, size) = visitor.seen[0];
        assert!(size.is_tombstone());
    }

    #[test]
    fn scan_ignores_version_of_the_volume_it_is_given() {
        // Guards against a regression where the scanner hard-codes V3.
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.dat");
        let options = VolumeOptions {
            version: Version::V1,
            ..VolumeOptions::default()
        };
        let volume = Volume::create(&path, options).unwrap();
        let needle = Needle::new_data(Cookie::new(1), NeedleId::new(1), Bytes::from_static(b"v1 body"));
        volume.append(&needle, 0).unwrap();

        let mut visitor = Recording {
            read_bodies: true,
            saw_super_block: false,
            seen: Vec::new(),
        };
        let new_tail = scan_volume(&volume, 0, &mut visitor).unwrap();
        assert_eq!(visitor.seen.len(), 1);
        assert_eq!(new_tail, volume.tail_offset());
    }
}
