//! The needle record: in-memory representation, encode to bytes, decode
//! from bytes, across the three on-disk format versions.
//!
//! Mirrors SeaweedFS's `needle_read_write.go` (`prepareWriteBuffer`,
//! `ReadBytes`, `readNeedleDataVersion2`), re-expressed with a tagged
//! `Contents` enum in place of a bare `Size == 0xFFFFFFFF` sentinel check
//! (see the "Tombstone-via-size-sentinel" design note).

use bytes::Bytes;
use needlestore_types::{Cookie, NeedleFlags, NeedleId, NeedleSize, Version};

use crate::error::NeedlestoreError;

/// Width of the `cookie` field.
pub const COOKIE_SIZE: u32 = 4;
/// Width of the `id` field.
pub const NEEDLE_ID_SIZE: u32 = 8;
/// Width of the `size` field.
pub const SIZE_SIZE: u32 = 4;
/// `cookie ‖ id ‖ size`.
pub const NEEDLE_HEADER_SIZE: u32 = COOKIE_SIZE + NEEDLE_ID_SIZE + SIZE_SIZE;
/// Width of the trailing CRC32 checksum.
pub const NEEDLE_CHECKSUM_SIZE: u32 = 4;
/// Width of the V3 trailing `appendAtNs` field.
pub const TIMESTAMP_SIZE: u32 = 8;
/// All needles are padded to a multiple of this many bytes.
pub const NEEDLE_PADDING_SIZE: u32 = 8;
/// Width of the `lastModified` optional field (low 5 bytes of a u64).
pub const LAST_MODIFIED_BYTES_LENGTH: u32 = 5;
/// Width of the opaque `ttl` optional field.
pub const TTL_BYTES_LENGTH: u32 = 2;

/// The reserved `size` value marking a needle as a deletion marker.
pub use needlestore_types::TOMBSTONE_FILE_SIZE;

/// Number of bytes of padding needed so a needle's total on-disk footprint
/// is a multiple of [`NEEDLE_PADDING_SIZE`]. Always in `1..=8` — a full
/// block of padding is written when the body ends exactly on a boundary.
#[must_use]
pub fn pad_len(size: u32, version: Version) -> u32 {
    let timestamp = if version.has_timestamp() {
        TIMESTAMP_SIZE
    } else {
        0
    };
    let occupied = u64::from(NEEDLE_HEADER_SIZE)
        + u64::from(size)
        + u64::from(NEEDLE_CHECKSUM_SIZE)
        + u64::from(timestamp);
    let remainder = occupied % u64::from(NEEDLE_PADDING_SIZE);
    (u64::from(NEEDLE_PADDING_SIZE) - remainder) as u32
}

/// Bytes consumed after the header: `size + checksum + (timestamp) + padding`.
#[must_use]
pub fn body_length(size: u32, version: Version) -> u64 {
    let timestamp = if version.has_timestamp() {
        u64::from(TIMESTAMP_SIZE)
    } else {
        0
    };
    u64::from(size) + u64::from(NEEDLE_CHECKSUM_SIZE) + timestamp + u64::from(pad_len(size, version))
}

/// Total on-disk footprint of a needle whose header records `size`.
#[must_use]
pub fn actual_size(size: u32, version: Version) -> u64 {
    u64::from(NEEDLE_HEADER_SIZE) + body_length(size, version)
}

/// Extracts the trailing `appendAtNs` directly from an already-read
/// needle buffer, without validating the checksum. Mirrors `ReadNeedleBody`
/// in the source, which recomputes a checksum from the data but never
/// compares it against the stored one on this path — it exists purely to
/// recover a timestamp for replication bookkeeping, not to detect
/// corruption. `bytes` must contain at least `actual_size(size.len(), version)`
/// bytes starting at the needle's header.
#[must_use]
pub fn read_append_at_ns(bytes: &[u8], size: NeedleSize, version: Version) -> u64 {
    if !version.has_timestamp() {
        return 0;
    }
    let ts_start = (NEEDLE_HEADER_SIZE + size.len() + NEEDLE_CHECKSUM_SIZE) as usize;
    let ts_end = ts_start + TIMESTAMP_SIZE as usize;
    needlestore_crypto::primitive::get_u64(&bytes[ts_start..ts_end])
}

/// The tagged optional fields of a V2/V3 needle body, present iff their
/// corresponding [`NeedleFlags`] bit is set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionalFields {
    pub name: Option<Bytes>,
    pub mime: Option<Bytes>,
    pub last_modified: Option<u64>,
    pub ttl: Option<[u8; 2]>,
    pub pairs: Option<Bytes>,
}

/// A needle's payload: either a live record or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    /// A deletion marker: no data, no optional fields.
    Tombstone,
    /// A live record.
    Data {
        data: Bytes,
        flags: NeedleFlags,
        optional: OptionalFields,
    },
}

impl Contents {
    fn data(&self) -> Bytes {
        match self {
            Contents::Tombstone => Bytes::new(),
            Contents::Data { data, .. } => data.clone(),
        }
    }
}

/// A single variable-length record in a volume data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    pub cookie: Cookie,
    pub id: NeedleId,
    pub contents: Contents,
    /// CRC32 over `data` only. Populated by [`Needle::encode`] and
    /// [`Needle::decode`]; zero for a freshly constructed needle that has
    /// not yet been encoded.
    pub checksum: u32,
    /// Wall-clock nanoseconds at append time. Only meaningful for
    /// [`Version::V3`]; zero otherwise.
    pub append_at_ns: u64,
}

impl Needle {
    /// Builds a fresh data needle. `checksum` is computed immediately since
    /// it depends only on `data`.
    #[must_use]
    pub fn new_data(cookie: Cookie, id: NeedleId, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let checksum = needlestore_crypto::crc32(&data);
        Self {
            cookie,
            id,
            contents: Contents::Data {
                data,
                flags: NeedleFlags::default(),
                optional: OptionalFields::default(),
            },
            checksum,
            append_at_ns: 0,
        }
    }

    /// Builds a fresh deletion marker for `id`.
    #[must_use]
    pub fn new_tombstone(cookie: Cookie, id: NeedleId) -> Self {
        Self {
            cookie,
            id,
            contents: Contents::Tombstone,
            checksum: 0,
            append_at_ns: 0,
        }
    }

    /// Attaches a `name`, setting [`NeedleFlags::HAS_NAME`]. Only valid on
    /// a data needle; a no-op on a tombstone.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Bytes>) -> Self {
        if let Contents::Data { flags, optional, .. } = &mut self.contents {
            flags.set_has_name(true);
            optional.name = Some(name.into());
        }
        self
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<Bytes>) -> Self {
        if let Contents::Data { flags, optional, .. } = &mut self.contents {
            flags.set_has_mime(true);
            optional.mime = Some(mime.into());
        }
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, seconds: u64) -> Self {
        if let Contents::Data { flags, optional, .. } = &mut self.contents {
            flags.set_has_last_modified(true);
            optional.last_modified = Some(seconds);
        }
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: [u8; 2]) -> Self {
        if let Contents::Data { flags, optional, .. } = &mut self.contents {
            flags.set_has_ttl(true);
            optional.ttl = Some(ttl);
        }
        self
    }

    #[must_use]
    pub fn with_pairs(mut self, pairs: impl Into<Bytes>) -> Self {
        if let Contents::Data { flags, optional, .. } = &mut self.contents {
            flags.set_has_pairs(true);
            optional.pairs = Some(pairs.into());
        }
        self
    }

    #[must_use]
    pub fn with_gzip(mut self) -> Self {
        if let Contents::Data { flags, .. } = &mut self.contents {
            flags.set_gzipped(true);
        }
        self
    }

    #[must_use]
    pub fn with_chunk_manifest(mut self) -> Self {
        if let Contents::Data { flags, .. } = &mut self.contents {
            flags.set_is_chunk_manifest(true);
        }
        self
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.contents, Contents::Tombstone)
    }

    pub fn data(&self) -> Bytes {
        self.contents.data()
    }

    /// Encodes this needle into a single contiguous buffer for the given
    /// format version, recording `append_at_ns` in the V3 trailer.
    ///
    /// Returns the buffer, the `size` value written into the header, and
    /// the total on-disk footprint (always a multiple of 8 and equal to
    /// [`actual_size`]).
    pub fn encode(
        &self,
        version: Version,
        append_at_ns: u64,
    ) -> Result<(Vec<u8>, NeedleSize, u64), NeedlestoreError> {
        match version {
            Version::V1 => self.encode_v1(),
            Version::V2 | Version::V3 => self.encode_tagged(version, append_at_ns),
        }
    }

    fn encode_v1(&self) -> Result<(Vec<u8>, NeedleSize, u64), NeedlestoreError> {
        let header_size = self.header_size_v1();
        let data = self.data();
        let size_len = header_size.len();
        let total = actual_size(size_len, Version::V1);

        let mut buf = Vec::with_capacity(total as usize);
        self.write_header(&mut buf, header_size);
        buf.extend_from_slice(&data);
        let mut checksum = [0u8; 4];
        needlestore_crypto::primitive::put_u32(&mut checksum, needlestore_crypto::crc32(&data));
        buf.extend_from_slice(&checksum);
        buf.resize(total as usize, 0);

        Ok((buf, header_size, total))
    }

    fn header_size_v1(&self) -> NeedleSize {
        match &self.contents {
            Contents::Tombstone => NeedleSize::Tombstone,
            Contents::Data { data, .. } => NeedleSize::Data(data.len() as u32),
        }
    }

    fn encode_tagged(
        &self,
        version: Version,
        append_at_ns: u64,
    ) -> Result<(Vec<u8>, NeedleSize, u64), NeedlestoreError> {
        let (header_size, body) = self.tagged_body(version, append_at_ns)?;
        let total = actual_size(header_size.len(), version);

        let mut buf = Vec::with_capacity(total as usize);
        self.write_header(&mut buf, header_size);
        buf.extend_from_slice(&body);
        buf.resize(total as usize, 0);

        Ok((buf, header_size, total))
    }

    /// Builds the `dataSize ‖ data ‖ flags ‖ optional-fields ‖ checksum ‖
    /// (V3: appendAtNs)` body, returning it alongside the header `size`.
    fn tagged_body(
        &self,
        version: Version,
        append_at_ns: u64,
    ) -> Result<(NeedleSize, Vec<u8>), NeedlestoreError> {
        let Contents::Data { data, flags, optional } = &self.contents else {
            // Tombstone: size is the sentinel, body is empty (no dataSize/flags/checksum-preamble).
            let mut body = Vec::with_capacity(8);
            let mut checksum = [0u8; 4];
            needlestore_crypto::primitive::put_u32(&mut checksum, 0);
            body.extend_from_slice(&checksum);
            if version.has_timestamp() {
                let mut ts = [0u8; 8];
                needlestore_crypto::primitive::put_u64(&mut ts, append_at_ns);
                body.extend_from_slice(&ts);
            }
            return Ok((NeedleSize::Tombstone, body));
        };

        if data.is_empty() {
            // dataSize == 0: the entire tagged body (including dataSize and
            // flags) is omitted, only checksum (+timestamp) remain.
            let mut body = Vec::with_capacity(8);
            let mut checksum = [0u8; 4];
            needlestore_crypto::primitive::put_u32(&mut checksum, needlestore_crypto::crc32(data));
            body.extend_from_slice(&checksum);
            if version.has_timestamp() {
                let mut ts = [0u8; 8];
                needlestore_crypto::primitive::put_u64(&mut ts, append_at_ns);
                body.extend_from_slice(&ts);
            }
            return Ok((NeedleSize::Data(0), body));
        }

        let mut tagged = Vec::with_capacity(4 + data.len() + 1);
        let mut data_size_bytes = [0u8; 4];
        needlestore_crypto::primitive::put_u32(&mut data_size_bytes, data.len() as u32);
        tagged.extend_from_slice(&data_size_bytes);
        tagged.extend_from_slice(data);
        tagged.push(flags.as_u8());

        if flags.has_name() {
            let name = optional.name.clone().unwrap_or_default();
            let name_len = name.len().min(u8::MAX as usize);
            tagged.push(name_len as u8);
            tagged.extend_from_slice(&name[..name_len]);
        }
        if flags.has_mime() {
            let mime = optional.mime.clone().unwrap_or_default();
            let mime_len = mime.len().min(u8::MAX as usize);
            tagged.push(mime_len as u8);
            tagged.extend_from_slice(&mime[..mime_len]);
        }
        if flags.has_last_modified() {
            let seconds = optional.last_modified.unwrap_or(0);
            let mut lm = [0u8; 5];
            needlestore_crypto::primitive::put_u40(&mut lm, seconds);
            tagged.extend_from_slice(&lm);
        }
        if flags.has_ttl() {
            let ttl = optional.ttl.unwrap_or([0, 0]);
            tagged.extend_from_slice(&ttl);
        }
        if flags.has_pairs() {
            let pairs = optional.pairs.clone().unwrap_or_default();
            let pairs_len = pairs.len().min(u16::MAX as usize);
            let mut size_bytes = [0u8; 2];
            needlestore_crypto::primitive::put_u16(&mut size_bytes, pairs_len as u16);
            tagged.extend_from_slice(&size_bytes);
            tagged.extend_from_slice(&pairs[..pairs_len]);
        }

        let header_size = NeedleSize::Data(tagged.len() as u32);

        let mut body = tagged;
        let mut checksum = [0u8; 4];
        needlestore_crypto::primitive::put_u32(&mut checksum, needlestore_crypto::crc32(data));
        body.extend_from_slice(&checksum);
        if version.has_timestamp() {
            let mut ts = [0u8; 8];
            needlestore_crypto::primitive::put_u64(&mut ts, append_at_ns);
            body.extend_from_slice(&ts);
        }

        Ok((header_size, body))
    }

    fn write_header(&self, buf: &mut Vec<u8>, size: NeedleSize) {
        let mut header = [0u8; NEEDLE_HEADER_SIZE as usize];
        needlestore_crypto::primitive::put_u32(&mut header[0..4], self.cookie.into());
        needlestore_crypto::primitive::put_u64(&mut header[4..12], self.id.into());
        needlestore_crypto::primitive::put_u32(&mut header[12..16], size.into());
        buf.extend_from_slice(&header);
    }

    /// Builds a placeholder needle carrying only header fields, used by the
    /// scanner when a visitor opts out of loading bodies ([`pad_len`] and
    /// the rest of the codec still need a real [`NeedleSize`] to compute
    /// the advance step, which is threaded separately rather than stored
    /// here). `checksum`/`append_at_ns` stay at their zero defaults.
    pub(crate) fn header_only(cookie: Cookie, id: NeedleId, size: NeedleSize) -> Self {
        let contents = if size.is_tombstone() {
            Contents::Tombstone
        } else {
            Contents::Data {
                data: Bytes::new(),
                flags: NeedleFlags::default(),
                optional: OptionalFields::default(),
            }
        };
        Self {
            cookie,
            id,
            contents,
            checksum: 0,
            append_at_ns: 0,
        }
    }

    /// Parses just the header (`cookie ‖ id ‖ size`) from `bytes[0..16]`.
    pub fn parse_header(bytes: &[u8]) -> (Cookie, NeedleId, NeedleSize) {
        let cookie = Cookie::new(needlestore_crypto::primitive::get_u32(&bytes[0..4]));
        let id = NeedleId::new(needlestore_crypto::primitive::get_u64(&bytes[4..12]));
        let size = NeedleSize::from(needlestore_crypto::primitive::get_u32(&bytes[12..16]));
        (cookie, id, size)
    }

    /// Decodes a needle from `bytes`, which must contain at least
    /// `actual_size(expected_size.len(), version)` bytes starting at the
    /// needle's header.
    ///
    /// `offset` is only used to enrich the [`NeedlestoreError::SizeMismatch`]
    /// error with the record's file position.
    pub fn decode(
        bytes: &[u8],
        offset: u64,
        version: Version,
        expected_size: NeedleSize,
    ) -> Result<Self, NeedlestoreError> {
        let (cookie, id, header_size) = Self::parse_header(bytes);

        if u32::from(header_size) != u32::from(expected_size) {
            return Err(NeedlestoreError::SizeMismatch {
                offset,
                found_id: id,
                found_size: u32::from(header_size),
                expected_size: u32::from(expected_size),
            });
        }

        let size_len = header_size.len() as usize;
        let header_end = NEEDLE_HEADER_SIZE as usize;
        let body = &bytes[header_end..header_end + size_len];

        let (data, flags, optional) = match version {
            Version::V1 => (Bytes::copy_from_slice(body), NeedleFlags::default(), OptionalFields::default()),
            Version::V2 | Version::V3 => Self::parse_tagged_body(body)?,
        };

        let checksum_start = header_end + size_len;
        let stored_checksum = needlestore_crypto::primitive::get_u32(
            &bytes[checksum_start..checksum_start + NEEDLE_CHECKSUM_SIZE as usize],
        );
        let computed_checksum = needlestore_crypto::crc32(&data);
        if stored_checksum != computed_checksum {
            return Err(NeedlestoreError::Corrupt { id });
        }

        let append_at_ns = if version.has_timestamp() {
            let ts_start = checksum_start + NEEDLE_CHECKSUM_SIZE as usize;
            needlestore_crypto::primitive::get_u64(&bytes[ts_start..ts_start + TIMESTAMP_SIZE as usize])
        } else {
            0
        };

        let contents = if header_size.is_tombstone() {
            Contents::Tombstone
        } else {
            Contents::Data { data, flags, optional }
        };

        Ok(Needle {
            cookie,
            id,
            contents,
            checksum: stored_checksum,
            append_at_ns,
        })
    }

    /// Parses the V2/V3 tagged body: `dataSize ‖ data ‖ flags ‖
    /// optional-fields`, bounds-checked at every advance. `body` spans
    /// exactly `size` bytes (the header's `size` field) — never more.
    ///
    /// Region numbers in [`NeedlestoreError::BoundsOverrun`] follow parse
    /// order, not field identity: 1=data, 2=name, 3=mime,
    /// 4=last-modified, 5=ttl, 6=pairs-size, 7=pairs-body.
    fn parse_tagged_body(
        body: &[u8],
    ) -> Result<(Bytes, NeedleFlags, OptionalFields), NeedlestoreError> {
        let len_bytes = body.len();
        let mut index = 0usize;
        let mut data = Bytes::new();
        let mut flags = NeedleFlags::default();
        let mut optional = OptionalFields::default();

        if index < len_bytes {
            if index + 4 > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 1 });
            }
            let data_size = needlestore_crypto::primitive::get_u32(&body[index..index + 4]) as usize;
            index += 4;
            if data_size + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 1 });
            }
            data = Bytes::copy_from_slice(&body[index..index + data_size]);
            index += data_size;
            flags = NeedleFlags::new(body[index]);
            index += 1;
        }

        if index < len_bytes && flags.has_name() {
            let name_size = body[index] as usize;
            index += 1;
            if name_size + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 2 });
            }
            optional.name = Some(Bytes::copy_from_slice(&body[index..index + name_size]));
            index += name_size;
        }

        if index < len_bytes && flags.has_mime() {
            let mime_size = body[index] as usize;
            index += 1;
            if mime_size + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 3 });
            }
            optional.mime = Some(Bytes::copy_from_slice(&body[index..index + mime_size]));
            index += mime_size;
        }

        if index < len_bytes && flags.has_last_modified() {
            let width = LAST_MODIFIED_BYTES_LENGTH as usize;
            if width + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 4 });
            }
            optional.last_modified = Some(needlestore_crypto::primitive::get_u40(
                &body[index..index + width],
            ));
            index += width;
        }

        if index < len_bytes && flags.has_ttl() {
            let width = TTL_BYTES_LENGTH as usize;
            if width + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 5 });
            }
            let mut ttl = [0u8; 2];
            ttl.copy_from_slice(&body[index..index + width]);
            optional.ttl = Some(ttl);
            index += width;
        }

        if index < len_bytes && flags.has_pairs() {
            if 2 + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 6 });
            }
            let pairs_size = needlestore_crypto::primitive::get_u16(&body[index..index + 2]) as usize;
            index += 2;
            if pairs_size + index > len_bytes {
                return Err(NeedlestoreError::BoundsOverrun { region: 7 });
            }
            optional.pairs = Some(Bytes::copy_from_slice(&body[index..index + pairs_size]));
            index += pairs_size;
        }

        Ok((data, flags, optional))
    }
}
