//! # needlestore-core: needle codec, append-only volume I/O, and
//! incremental replication
//!
//! This crate implements the on-disk record format and volume-to-volume
//! replication subsystem of a distributed blob store. Each storage node
//! owns one or more *volumes*: append-only data files containing
//! variable-sized records called *needles*, accompanied by a fixed-stride
//! `.idx` file.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │     needlestore-core      │
//! │                           │
//! │  needle ──encode──► bytes │
//! │    ▲                 │   │
//! │    └──decode──────────┘  │
//! │                           │
//! │  volume ─append/read─► backend (direct | mmap)
//! │  index  ─read_entry──► .idx file
//! │  scanner ─visits────► volume
//! │  replication ─drives─► index + volume + scanner
//! └───────────────────────────┘
//! ```
//!
//! The filer namespace, gRPC service definitions, S3-compatible gateway,
//! master/volume-assignment service, compaction, garbage collection, and
//! the needle-map's own storage are all external collaborators; this
//! crate only consumes the needle-map through the narrow [`needle_map::NeedleMap`]
//! trait.

pub mod backend;
pub mod error;
pub mod index;
pub mod needle;
pub mod needle_map;
pub mod replication;
pub mod scanner;
pub mod superblock;
pub mod volume;

pub use error::NeedlestoreError;
pub use needle::{Contents, Needle, OptionalFields};
