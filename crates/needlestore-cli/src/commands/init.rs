//! Init command - creates a new, empty volume data file.

use std::path::Path;

use anyhow::{Context, Result};
use needlestore_core::volume::{Volume, VolumeOptions};
use needlestore_types::Version;

pub fn run(data: &Path, version: Version, mapped: bool) -> Result<()> {
    let options = VolumeOptions {
        version,
        mapped,
        ..VolumeOptions::default()
    };
    let volume = Volume::create(data, options)
        .with_context(|| format!("failed to create volume at {}", data.display()))?;

    println!("Created volume {}", data.display());
    println!("  version:     {}", version.as_u8());
    println!("  mapped:      {mapped}");
    println!("  tail offset: {}", volume.tail_offset());
    Ok(())
}
