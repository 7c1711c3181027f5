//! Low-level byte sink behind every write target.
//!
//! A [`Writer`] owns an in-memory image of one backing file plus a cursor.
//! Writes land at the cursor and overwrite or extend the image; seeking past
//! the end and writing there zero-fills the gap. The backing file decides
//! what happens to the image when the target is finalized.
//!
//! Every byte passes through the optional XOR transform and checksum
//! accumulator before it reaches the image.

use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::checksum::{ChecksumCalculator, XorCalculator};
use crate::constants::NULLABLE_BYTE_ABSENT;
use crate::error::Result;
use crate::primitive::{Endian, TextEncoding, Value};

/// A seekable, endianness-aware byte sink.
#[derive(Debug)]
pub struct Writer {
    cursor: Cursor<Vec<u8>>,
    endian: Endian,
    base_address: u64,
    checksum: Option<Box<dyn ChecksumCalculator>>,
    xor: Option<Box<dyn XorCalculator>>,
}

impl Writer {
    /// Creates a writer over `data`, positioned at its start.
    pub fn new(data: Vec<u8>, endian: Endian, base_address: u64) -> Self {
        Self {
            cursor: Cursor::new(data),
            endian,
            base_address,
            checksum: None,
            xor: None,
        }
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Moves the cursor. Positions past the end are allowed.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.cursor.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Length of the image.
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// True if nothing has been written or loaded.
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Active byte order.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Switches the byte order of subsequent writes.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Base address of the backing file.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// The image written so far.
    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Consumes the writer, returning the image.
    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    /// Writes raw bytes through the active transforms.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.checksum.is_none() && self.xor.is_none() {
            self.cursor.write_all(bytes)?;
            return Ok(());
        }

        let mut buffer = bytes.to_vec();
        if let Some(checksum) = self.checksum.as_mut()
            && checksum.calculate_for_decrypted()
        {
            checksum.add_bytes(&buffer);
        }
        if let Some(xor) = self.xor.as_mut() {
            xor.xor_bytes(&mut buffer);
        }
        if let Some(checksum) = self.checksum.as_mut()
            && !checksum.calculate_for_decrypted()
        {
            checksum.add_bytes(&buffer);
        }
        self.cursor.write_all(&buffer)?;
        Ok(())
    }

    /// Writes one scalar in the active byte order.
    pub fn write_value(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Bool(v) => self.write_bytes(&[u8::from(v)]),
            Value::I8(v) => self.write_bytes(&v.to_le_bytes()),
            Value::U8(v) => self.write_bytes(&[v]),
            Value::I16(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::U16(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::U24(v) => {
                let bytes = v.to_bytes(self.endian);
                self.write_bytes(&bytes)
            }
            Value::I32(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::U32(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::I64(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::U64(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::F32(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::F64(v) => self.write_ordered(v.to_le_bytes(), v.to_be_bytes()),
            Value::NullableU8(v) => self.write_bytes(&[v.unwrap_or(NULLABLE_BYTE_ABSENT)]),
        }
    }

    fn write_ordered<const N: usize>(&mut self, le: [u8; N], be: [u8; N]) -> Result<()> {
        match self.endian {
            Endian::Little => self.write_bytes(&le),
            Endian::Big => self.write_bytes(&be),
        }
    }

    /// Writes a string: padded or truncated to `length` bytes when given,
    /// otherwise followed by a terminator.
    pub fn write_string(
        &mut self,
        text: &str,
        length: Option<usize>,
        encoding: TextEncoding,
    ) -> Result<()> {
        let mut bytes = encoding.encode(text);
        match length {
            Some(length) => bytes.resize(length, 0),
            None => bytes.resize(bytes.len() + encoding.unit_size(), 0),
        }
        self.write_bytes(&bytes)
    }

    /// Starts feeding written bytes into `calculator`, replacing any active one.
    pub fn begin_checksum(&mut self, calculator: Box<dyn ChecksumCalculator>) {
        self.checksum = Some(calculator);
    }

    /// Stops the checksum and returns its value, if one was active.
    pub fn end_checksum(&mut self) -> Option<u64> {
        self.checksum.take().map(|c| c.checksum())
    }

    /// Starts transforming written bytes with `calculator`.
    pub fn begin_xor(&mut self, calculator: Box<dyn XorCalculator>) {
        self.xor = Some(calculator);
    }

    /// Stops the XOR transform and hands the calculator back.
    pub fn end_xor(&mut self) -> Option<Box<dyn XorCalculator>> {
        self.xor.take()
    }

    /// The active XOR calculator.
    pub fn xor(&self) -> Option<&dyn XorCalculator> {
        self.xor.as_deref()
    }
}
