//! Verify command - scan a volume, validating every needle's checksum.

use std::path::Path;

use anyhow::{Context, Result};
use needlestore_core::needle::Needle;
use needlestore_core::scanner::{scan_volume, VolumeVisitor};
use needlestore_core::superblock::SuperBlock;
use needlestore_core::volume::Volume;
use needlestore_core::NeedlestoreError;
use needlestore_types::NeedleSize;

struct Counter {
    needles: u64,
    tombstones: u64,
}

impl VolumeVisitor for Counter {
    fn visit_super_block(&mut self, _superblock: SuperBlock) -> Result<(), NeedlestoreError> {
        Ok(())
    }

    fn read_needle_body(&self) -> bool {
        true
    }

    fn visit_needle(&mut self, _needle: &Needle, size: NeedleSize, _offset: u64) -> Result<(), NeedlestoreError> {
        self.needles += 1;
        if size.is_tombstone() {
            self.tombstones += 1;
        }
        Ok(())
    }
}

pub fn run(data: &Path) -> Result<()> {
    let volume = Volume::open(data, false).with_context(|| format!("failed to open volume at {}", data.display()))?;

    let mut counter = Counter { needles: 0, tombstones: 0 };
    match scan_volume(&volume, 0, &mut counter) {
        Ok(_tail) => {
            println!("OK {}", data.display());
            println!("  needles:    {}", counter.needles);
            println!("  tombstones: {}", counter.tombstones);
            Ok(())
        }
        Err(err) => {
            println!("FAILED {}: {err} (after {} needles checked)", data.display(), counter.needles);
            Err(err.into())
        }
    }
}
