//! # needlestore-crypto: checksum and primitive-integer codec
//!
//! Two small, dependency-free pieces shared by the needle codec and the
//! index file reader:
//! - [`crc32`] / [`crc32::Crc32`] — the CRC32C checksum covering needle
//!   payloads and index file integrity.
//! - [`primitive`] — fixed-width big-endian integer encode/decode used by
//!   every on-disk struct in `needlestore-core`.

pub mod crc32;
pub mod primitive;

pub use crc32::crc32;
