//! Inspect command - print a volume's superblock and tail offset.

use std::path::Path;

use anyhow::{Context, Result};
use needlestore_core::volume::Volume;

pub fn run(data: &Path) -> Result<()> {
    let volume = Volume::open(data, false).with_context(|| format!("failed to open volume at {}", data.display()))?;
    let superblock = volume.superblock();

    println!("Volume {}", data.display());
    println!("  version:            {}", superblock.version.as_u8());
    println!("  replica placement:  {}", superblock.replica_placement);
    println!("  ttl:                {}", superblock.ttl);
    println!("  compaction revision: {}", superblock.compaction_revision);
    println!("  tail offset:        {}", volume.tail_offset());
    Ok(())
}
