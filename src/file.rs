//! Backing files: the logical byte ranges a format is spread over.
//!
//! A [`BinaryFile`] knows its base address and default byte order and can
//! hand out a [`Writer`] over its current contents. When the engine finalizes
//! the target, the writer comes back through [`BinaryFile::end_write`] and the
//! file decides where the bytes go.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::Writer;
use crate::primitive::Endian;
use crate::serializable::AsAny;

/// One addressable byte range with its own base address and byte order.
pub trait BinaryFile: AsAny + fmt::Debug {
    /// Unique key of the file within its context.
    fn name(&self) -> &str;

    /// Address of the file's first byte in the format's address space.
    fn base_address(&self) -> u64 {
        0
    }

    /// Default byte order of writes to this file.
    fn endianness(&self) -> Endian;

    /// True for files that exist only while an encoded region is open.
    fn is_virtual(&self) -> bool {
        false
    }

    /// Opens a write target over the current contents.
    ///
    /// # Errors
    /// Returns `Io` if existing contents cannot be loaded.
    fn create_writer(&mut self) -> Result<Writer>;

    /// Finalizes a target created by [`create_writer`](Self::create_writer).
    ///
    /// # Errors
    /// Returns `Io` if the bytes cannot be persisted.
    fn end_write(&mut self, writer: Writer) -> Result<()>;
}

/// A file held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    base_address: u64,
    endianness: Endian,
    data: Vec<u8>,
}

impl MemoryFile {
    /// An empty little-endian file at base address 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_address: 0,
            endianness: Endian::Little,
            data: Vec::new(),
        }
    }

    /// Sets the base address.
    pub fn with_base_address(mut self, base_address: u64) -> Self {
        self.base_address = base_address;
        self
    }

    /// Sets the byte order.
    pub fn with_endianness(mut self, endianness: Endian) -> Self {
        self.endianness = endianness;
        self
    }

    /// Seeds the file with existing contents. Writes overwrite them in place.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Contents as of the last finalized write.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl BinaryFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_address(&self) -> u64 {
        self.base_address
    }

    fn endianness(&self) -> Endian {
        self.endianness
    }

    fn create_writer(&mut self) -> Result<Writer> {
        Ok(Writer::new(
            self.data.clone(),
            self.endianness,
            self.base_address,
        ))
    }

    fn end_write(&mut self, writer: Writer) -> Result<()> {
        self.data = writer.into_inner();
        Ok(())
    }
}

/// A file on disk.
///
/// Existing contents are loaded when the target opens, so bytes the pass does
/// not touch survive unchanged. The image is written back on finalization.
#[derive(Debug, Clone)]
pub struct LinearFile {
    name: String,
    path: PathBuf,
    base_address: u64,
    endianness: Endian,
}

impl LinearFile {
    /// A little-endian file at base address 0. `name` doubles as the context key.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            base_address: 0,
            endianness: Endian::Little,
        }
    }

    /// Sets the base address.
    pub fn with_base_address(mut self, base_address: u64) -> Self {
        self.base_address = base_address;
        self
    }

    /// Sets the byte order.
    pub fn with_endianness(mut self, endianness: Endian) -> Self {
        self.endianness = endianness;
        self
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn resolve_against(&mut self, base: &Path) {
        if self.path.is_relative() && !base.as_os_str().is_empty() {
            self.path = base.join(&self.path);
        }
    }
}

impl BinaryFile for LinearFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_address(&self) -> u64 {
        self.base_address
    }

    fn endianness(&self) -> Endian {
        self.endianness
    }

    fn create_writer(&mut self) -> Result<Writer> {
        let data = if self.path.exists() {
            std::fs::read(&self.path)?
        } else {
            Vec::new()
        };
        Ok(Writer::new(data, self.endianness, self.base_address))
    }

    fn end_write(&mut self, writer: Writer) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(writer.data())?;
        out.flush()?;
        Ok(())
    }
}

/// The private buffer of an open encoded region.
#[derive(Debug, Clone)]
pub struct StreamFile {
    name: String,
    endianness: Endian,
}

impl StreamFile {
    /// Creates an empty region buffer.
    pub fn new(name: impl Into<String>, endianness: Endian) -> Self {
        Self {
            name: name.into(),
            endianness,
        }
    }
}

impl BinaryFile for StreamFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn endianness(&self) -> Endian {
        self.endianness
    }

    fn is_virtual(&self) -> bool {
        true
    }

    fn create_writer(&mut self) -> Result<Writer> {
        Ok(Writer::new(Vec::new(), self.endianness, 0))
    }

    // The engine consumes region buffers itself; a stray finalization drops them.
    fn end_write(&mut self, _writer: Writer) -> Result<()> {
        Ok(())
    }
}
