//! Pluggable stream encoders for encoded regions.
//!
//! An encoded region collects the bytes written inside it into a private
//! buffer and, once the region closes, hands that buffer to a
//! [`StreamEncoder`]. Whatever the encoder returns is what lands in the
//! enclosing stream. Compression and encryption schemes plug in here.

use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "flate2")]
use std::io::{Read, Write};

#[cfg(any(feature = "lz4_flex", feature = "flate2"))]
use crate::error::SerializerError;
use crate::error::Result;

/// Interface for stream encoders.
pub trait StreamEncoder: Send + Sync + fmt::Debug {
    /// Name used to derive the key of encoded regions and in diagnostics.
    fn name(&self) -> &str;

    /// Encodes a complete region.
    ///
    /// Returns a `Cow<[u8]>` which may borrow the input when the encoder
    /// leaves the data untouched.
    fn encode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Reverses [`encode`](Self::encode).
    fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

// --- Pass-through ---

/// An encoder that leaves the data as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncoding;

impl StreamEncoder for NoEncoding {
    fn name(&self) -> &str {
        "None"
    }

    fn encode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

// --- XOR ---

/// Single-byte XOR "encryption", as found in many older archive formats.
#[derive(Debug, Clone, Copy)]
pub struct XorEncoder {
    key: u8,
}

impl XorEncoder {
    /// Creates the encoder.
    pub fn new(key: u8) -> Self {
        Self { key }
    }
}

impl StreamEncoder for XorEncoder {
    fn name(&self) -> &str {
        "XOR"
    }

    fn encode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(data.iter().map(|b| b ^ self.key).collect()))
    }

    fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        self.encode(data)
    }
}

// --- LZ4 ---

#[cfg(feature = "lz4_flex")]
/// LZ4 block compression with a little-endian `u32` size prefix.
///
/// Available with the `lz4_flex` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Encoder;

#[cfg(feature = "lz4_flex")]
impl StreamEncoder for Lz4Encoder {
    fn name(&self) -> &str {
        "LZ4"
    }

    fn encode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let vec = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| SerializerError::Encoding(e.to_string()))?;
        Ok(Cow::Owned(vec))
    }
}

// --- zlib ---

#[cfg(feature = "flate2")]
/// zlib (RFC 1950) compression.
///
/// Available with the `flate2` feature.
#[derive(Debug, Clone, Copy)]
pub struct ZlibEncoder {
    level: u32,
}

#[cfg(feature = "flate2")]
impl ZlibEncoder {
    /// Compression level 0-9.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

#[cfg(feature = "flate2")]
impl Default for ZlibEncoder {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "flate2")]
impl StreamEncoder for ZlibEncoder {
    fn name(&self) -> &str {
        "Zlib"
    }

    fn encode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| SerializerError::Encoding(e.to_string()))?;
        let out = encoder
            .finish()
            .map_err(|e| SerializerError::Encoding(e.to_string()))?;
        Ok(Cow::Owned(out))
    }

    fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| SerializerError::Encoding(e.to_string()))?;
        Ok(Cow::Owned(out))
    }
}
