//! needlestore: inspect volumes and index files, verify checksums, and
//! drive a local leader -> follower replication pass without a network.
//!
//! Scoped to what `needlestore-core` actually owns (§1 treats the filer,
//! gRPC transport, and master assignment service as external
//! collaborators); this binary exists for manual inspection and demos,
//! the way `kimberlite-cli` exposes the storage layer it sits on top of.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use needlestore_types::Version;

/// Inspect needlestore volumes and drive local replication.
#[derive(Parser)]
#[command(name = "needlestore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Create a new, empty volume data file.
    Init {
        /// Path to the volume data file to create.
        data: PathBuf,

        /// Needle format version to write (1, 2, or 3).
        #[arg(long, default_value = "3")]
        version: u8,

        /// Back the data file with a growable memory-mapped view.
        #[arg(long)]
        mapped: bool,
    },

    /// Print a volume's superblock and tail offset.
    Inspect {
        /// Path to the volume data file.
        data: PathBuf,
    },

    /// Dump the entries of a `.idx` file.
    Idx {
        /// Path to the index file.
        index: PathBuf,
    },

    /// Scan a volume, validating every needle's checksum.
    Verify {
        /// Path to the volume data file.
        data: PathBuf,
    },

    /// Replicate a leader volume into a follower volume, locally.
    Replicate {
        /// Path to the leader's volume data file.
        leader_data: PathBuf,
        /// Path to the leader's index file.
        leader_index: PathBuf,
        /// Path to the follower's volume data file.
        follower_data: PathBuf,
        /// Path to the follower's index file.
        follower_index: PathBuf,
    },
}

fn parse_version(raw: u8) -> Result<Version> {
    Version::from_u8(raw).ok_or_else(|| anyhow::anyhow!("unsupported needle version: {raw} (expected 1, 2, or 3)"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { data, version, mapped } => commands::init::run(&data, parse_version(version)?, mapped),
        Commands::Inspect { data } => commands::inspect::run(&data),
        Commands::Idx { index } => commands::idx::run(&index),
        Commands::Verify { data } => commands::verify::run(&data),
        Commands::Replicate {
            leader_data,
            leader_index,
            follower_data,
            follower_index,
        } => commands::replicate::run(&leader_data, &leader_index, &follower_data, &follower_index),
    }
}
