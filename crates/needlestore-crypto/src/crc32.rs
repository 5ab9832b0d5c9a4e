//! CRC32C (Castagnoli) checksum implementation.
//!
//! Table-driven, matching the checksum already stored alongside needle
//! bodies on disk: changing the polynomial would silently invalidate every
//! existing volume, so this is a wire compatibility constant, not a tuning
//! knob.
//!
//! ## Usage
//!
//! ```
//! use needlestore_crypto::crc32;
//!
//! let checksum = crc32(b"hello world");
//!
//! let mut hasher = crc32::Crc32::new();
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//! let checksum = hasher.finalize();
//! ```

/// Castagnoli CRC32 polynomial (reversed): 0x82F63B78.
const POLYNOMIAL: u32 = 0x82F6_3B78;

/// Precomputed CRC32C lookup table (256 entries), generated at compile time.
const CRC32_TABLE: [u32; 256] = generate_table();

const fn generate_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the CRC32C checksum of `data` in one shot.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

/// Incremental CRC32C hasher for streaming or chunked data.
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    #[must_use]
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.state ^ u32::from(byte)) & 0xFF) as usize;
            self.state = (self.state >> 8) ^ CRC32_TABLE[index];
        }
    }

    #[must_use]
    pub fn finalize(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_of_empty_is_zero() {
        assert_eq!(crc32(b""), 0x0000_0000);
    }

    #[test]
    fn crc32_known_vector() {
        // Standard CRC32C ("CRC-32/ISCSI") test vector for "123456789".
        assert_eq!(crc32(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = b"hello world this is a test";
        let mut hasher = Crc32::new();
        hasher.update(data);
        assert_eq!(hasher.finalize(), crc32(data));
    }

    #[test]
    fn chunking_does_not_change_result() {
        let data = b"The quick brown fox jumps over the lazy dog";
        for split in 0..data.len() {
            let mut hasher = Crc32::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), crc32(data));
        }
    }

    #[cfg(test)]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn incremental_matches_one_shot_prop(data: Vec<u8>) {
                let mut hasher = Crc32::new();
                hasher.update(&data);
                prop_assert_eq!(hasher.finalize(), crc32(&data));
            }

            #[test]
            fn chunking_invariant(data: Vec<u8>, split: usize) {
                if data.is_empty() {
                    return Ok(());
                }
                let split = split % data.len();
                let mut hasher = Crc32::new();
                hasher.update(&data[..split]);
                hasher.update(&data[split..]);
                prop_assert_eq!(hasher.finalize(), crc32(&data));
            }
        }
    }
}
