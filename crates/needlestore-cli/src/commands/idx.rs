//! Idx command - dump the entries of a `.idx` file.

use std::path::Path;

use anyhow::{Context, Result};
use needlestore_core::index::IndexFile;

pub fn run(index: &Path) -> Result<()> {
    let file = IndexFile::open(index).with_context(|| format!("failed to open index at {}", index.display()))?;

    println!("Index {} ({} entries)", index.display(), file.entry_count());
    for m in 0..file.entry_count() {
        let entry = file.read_entry(m)?;
        let tombstone = if entry.size.is_tombstone() { " (tombstone)" } else { "" };
        println!(
            "  [{m}] id={} offset={} size={}{tombstone}",
            entry.id,
            entry.offset.to_actual_offset(),
            entry.size.len(),
        );
    }
    Ok(())
}
