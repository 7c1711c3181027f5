//! # Binser
//!
//! A bidirectional binary format serialization engine for reverse-engineering
//! and re-packing proprietary formats (game assets, save files).
//!
//! ## Overview
//!
//! A structure describes its layout once, by implementing [`Serializable`]
//! and issuing protocol calls against a [`SerializerObject`]: scalars,
//! strings, arrays, nested objects, pointers, bit-field groups. The engine
//! behind the trait object decides what the calls mean. [`BinarySerializer`]
//! writes; a reading engine would run the very same description and fill the
//! structure in.
//!
//! ### Key Features
//!
//! *   **Multi-file address space:** a format can span several backing files,
//!     each with its own base address and byte order. Pointers carry their
//!     file, and a jump to a pointer switches the active target.
//! *   **Object graphs:** shared objects live in an arena and are written once
//!     per pass, no matter how many pointers reach them. Cycles terminate.
//! *   **Sub-byte fields:** bit-value groups and channel-packed colors pack
//!     arbitrary-width fields into one integer.
//! *   **Encoded regions:** bytes written inside a region are collected in a
//!     private buffer and passed through a [`StreamEncoder`] (compression,
//!     encryption) before they reach the enclosing stream.
//! *   **Scopes:** byte order overrides, running checksums and XOR transforms
//!     apply to a span of writes and are unwound when the span ends, also on
//!     the error path.
//!
//! ## Architecture
//!
//! ### Context
//!
//! The [`Context`] owns the registered [`BinaryFile`]s, the [`ObjectArena`]
//! of shared objects, the [`ContextSettings`] and the optional diagnostic
//! [`LogSink`].
//!
//! ### Targets
//!
//! A write pass keeps one [`Writer`] per backing file it has touched, opened
//! lazily and kept until the pass finalizes it. Exactly one target is active
//! at a time; every primitive write goes to it.
//!
//! ### Dedup ledger
//!
//! [`WriteLedger`] records the shared objects the pass has written. Reaching
//! one again skips over the bytes it occupies instead of writing it twice.
//!
//! ## Usage
//!
//! ```rust
//! use binser::{
//!     Binser, Endian, ObjectState, Result, Serializable, SerializerExt, SerializerObject,
//! };
//!
//! #[derive(Debug, Default)]
//! struct Entry {
//!     state: ObjectState,
//!     id: u16,
//!     flags: u8,
//!     name: String,
//! }
//!
//! impl Serializable for Entry {
//!     fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
//!         self.id = s.serialize(self.id, "id")?;
//!         self.flags = s.serialize(self.flags, "flags")?;
//!         self.name = s.serialize_string(&self.name, Some(4), None, "name")?;
//!         Ok(())
//!     }
//!
//!     fn state(&self) -> &ObjectState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ObjectState {
//!         &mut self.state
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut entry = Entry { id: 0x0102, flags: 7, name: "ab".into(), ..Entry::default() };
//! let bytes = Binser::to_bytes(&mut entry, Endian::Big)?;
//! assert_eq!(bytes, [0x01, 0x02, 7, b'a', b'b', 0, 0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety and Error Handling
//!
//! The crate forbids `unsafe` code and never unwraps on recoverable paths.
//! Failures surface as [`SerializerError`]; a failed pass leaves its targets
//! partially written and the caller should discard them. Violated
//! preconditions of the bit-level codecs (a field wider than its backing
//! integer) are programming errors and panic.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC MODULES ---
pub mod api;
pub mod binary_serializer;
pub mod bits;
pub mod checksum;
pub mod color;
pub mod context;
pub mod encoder;
pub mod error;
pub mod file;
pub mod inspector;
pub mod pointer;
pub mod primitive;
pub mod serializable;
pub mod serializer;

// --- INTERNAL MODULES ---
#[doc(hidden)]
pub mod graph;
#[doc(hidden)]
pub mod io;
#[doc(hidden)]
pub mod targets;

// --- RE-EXPORTS ---
pub use api::Binser;
pub use binary_serializer::BinarySerializer;
pub use checksum::{
    ByteSumChecksum, ChecksumCalculator, Xor8Calculator, XorCalculator, XorKeyCalculator,
    XxHash64Checksum,
};
pub use color::{Color, CustomColor, PackedColor, Rgba};
pub use context::{Context, ContextId, ContextSettings, LogCrateSink, LogSink, MemoryLog};
pub use encoder::{NoEncoding, StreamEncoder, XorEncoder};
pub use error::{Result, SerializerError};
pub use file::{BinaryFile, LinearFile, MemoryFile, StreamFile};
pub use graph::{ObjectArena, ObjectId, WriteLedger};
pub use inspector::{SerializationInspector, SerializationReport};
pub use io::Writer;
pub use pointer::{FileId, ObjectPointer, Pointer};
pub use primitive::{Endian, Primitive, PrimitiveKind, TextEncoding, U24, Value};
pub use serializable::{ObjectState, Serializable};
pub use serializer::{
    BitValues, EncodedOptions, PointerOptions, SerializerExt, SerializerObject,
};

#[cfg(feature = "lz4_flex")]
pub use encoder::Lz4Encoder;
#[cfg(feature = "flate2")]
pub use encoder::ZlibEncoder;

/// Constants used across the crate.
pub mod constants {
    /// Size in bytes of a serialized pointer field.
    pub const POINTER_SIZE: usize = 4;
    /// Byte written for an absent nullable byte.
    pub const NULLABLE_BYTE_ABSENT: u8 = 0xFF;
    /// Widest channel layout a packed color can store.
    pub const MAX_PACKED_COLOR_BITS: u32 = 32;
}
