//! The closed set of scalar kinds the engine knows how to move.
//!
//! Every primitive field travels through the protocol as a [`Value`]. Adding a
//! new scalar kind means adding a variant here and teaching the writer about
//! it; there is no open-ended type dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bits::BitInt;
use crate::error::{Result, SerializerError};

/// Byte order of a target or scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endian {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => f.write_str("little"),
            Self::Big => f.write_str("big"),
        }
    }
}

/// Text encodings understood by string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// 7-bit ASCII. Characters outside the range become `?`.
    Ascii,
    /// ISO-8859-1. Characters above U+00FF become `?`.
    Latin1,
    /// UTF-16, little-endian code units.
    Utf16Le,
    /// UTF-16, big-endian code units.
    Utf16Be,
}

impl TextEncoding {
    /// Size in bytes of one code unit (and of the string terminator).
    pub fn unit_size(self) -> usize {
        match self {
            Self::Utf16Le | Self::Utf16Be => 2,
            _ => 1,
        }
    }

    /// Encodes `text` without a terminator.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

/// An unsigned 24-bit integer, stored as three raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct U24(u32);

impl U24 {
    /// Largest representable value.
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Creates a value, discarding bits above bit 23.
    pub fn new(value: u32) -> Self {
        Self(value & Self::MAX)
    }

    /// Returns the value widened to 32 bits.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Bytes in the given order.
    pub fn to_bytes(self, endian: Endian) -> [u8; 3] {
        let [b0, b1, b2, _] = self.0.to_le_bytes();
        match endian {
            Endian::Little => [b0, b1, b2],
            Endian::Big => [b2, b1, b0],
        }
    }
}

impl fmt::Display for U24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for U24 {
    fn from(value: u16) -> Self {
        Self(u32::from(value))
    }
}

impl TryFrom<u32> for U24 {
    type Error = SerializerError;

    fn try_from(value: u32) -> Result<Self> {
        if value > Self::MAX {
            return Err(SerializerError::UnsupportedType(format!(
                "{value} does not fit in 24 bits"
            )));
        }
        Ok(Self(value))
    }
}

impl BitInt for U24 {
    const BITS: u32 = 24;

    fn to_u64(self) -> u64 {
        u64::from(self.0)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_u64(value: u64) -> Self {
        Self::new(value as u32)
    }
}

/// Discriminant of [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// One byte, 0 or 1.
    Bool,
    /// Signed byte.
    I8,
    /// Unsigned byte.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 24-bit integer.
    U24,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE-754 single.
    F32,
    /// IEEE-754 double.
    F64,
    /// Optional byte, `0xFF` when absent.
    NullableU8,
}

impl PrimitiveKind {
    /// Serialized size in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 | Self::NullableU8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U24 => 3,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Short type name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::U24 => "u24",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::NullableU8 => "u8?",
        }
    }
}

/// A single scalar field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// See [`PrimitiveKind::Bool`].
    Bool(bool),
    /// See [`PrimitiveKind::I8`].
    I8(i8),
    /// See [`PrimitiveKind::U8`].
    U8(u8),
    /// See [`PrimitiveKind::I16`].
    I16(i16),
    /// See [`PrimitiveKind::U16`].
    U16(u16),
    /// See [`PrimitiveKind::U24`].
    U24(U24),
    /// See [`PrimitiveKind::I32`].
    I32(i32),
    /// See [`PrimitiveKind::U32`].
    U32(u32),
    /// See [`PrimitiveKind::I64`].
    I64(i64),
    /// See [`PrimitiveKind::U64`].
    U64(u64),
    /// See [`PrimitiveKind::F32`].
    F32(f32),
    /// See [`PrimitiveKind::F64`].
    F64(f64),
    /// See [`PrimitiveKind::NullableU8`].
    NullableU8(Option<u8>),
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::I8(_) => PrimitiveKind::I8,
            Self::U8(_) => PrimitiveKind::U8,
            Self::I16(_) => PrimitiveKind::I16,
            Self::U16(_) => PrimitiveKind::U16,
            Self::U24(_) => PrimitiveKind::U24,
            Self::I32(_) => PrimitiveKind::I32,
            Self::U32(_) => PrimitiveKind::U32,
            Self::I64(_) => PrimitiveKind::I64,
            Self::U64(_) => PrimitiveKind::U64,
            Self::F32(_) => PrimitiveKind::F32,
            Self::F64(_) => PrimitiveKind::F64,
            Self::NullableU8(_) => PrimitiveKind::NullableU8,
        }
    }

    /// Builds an integer value of `kind` from raw bits (two's complement for
    /// signed kinds, truncated to the kind's width).
    ///
    /// # Errors
    /// Returns `UnsupportedType` for non-integer kinds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn from_bits(kind: PrimitiveKind, bits: u64) -> Result<Self> {
        Ok(match kind {
            PrimitiveKind::I8 => Self::I8(bits as i8),
            PrimitiveKind::U8 => Self::U8(bits as u8),
            PrimitiveKind::I16 => Self::I16(bits as i16),
            PrimitiveKind::U16 => Self::U16(bits as u16),
            PrimitiveKind::U24 => Self::U24(U24::from_u64(bits)),
            PrimitiveKind::I32 => Self::I32(bits as i32),
            PrimitiveKind::U32 => Self::U32(bits as u32),
            PrimitiveKind::I64 => Self::I64(bits as i64),
            PrimitiveKind::U64 => Self::U64(bits),
            other => {
                return Err(SerializerError::UnsupportedType(format!(
                    "{} cannot back a bit field",
                    other.name()
                )));
            }
        })
    }

    /// True for signed values below zero.
    pub fn is_negative(&self) -> bool {
        match *self {
            Self::I8(v) => v < 0,
            Self::I16(v) => v < 0,
            Self::I32(v) => v < 0,
            Self::I64(v) => v < 0,
            Self::F32(v) => v < 0.0,
            Self::F64(v) => v < 0.0,
            _ => false,
        }
    }

    /// Raw bits of an integer value.
    ///
    /// # Errors
    /// Returns `UnsupportedType` for non-integer values.
    #[allow(clippy::cast_sign_loss)]
    pub fn to_bits(&self) -> Result<u64> {
        Ok(match *self {
            Self::I8(v) => u64::from(v as u8),
            Self::U8(v) => u64::from(v),
            Self::I16(v) => u64::from(v as u16),
            Self::U16(v) => u64::from(v),
            Self::U24(v) => u64::from(v.get()),
            Self::I32(v) => u64::from(v as u32),
            Self::U32(v) => u64::from(v),
            Self::I64(v) => v as u64,
            Self::U64(v) => v,
            other => {
                return Err(SerializerError::UnsupportedType(format!(
                    "{} is not an integer",
                    other.kind().name()
                )));
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U24(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::NullableU8(Some(v)) => write!(f, "{v}"),
            Self::NullableU8(None) => f.write_str("null"),
        }
    }
}

/// A Rust scalar type that maps onto exactly one [`PrimitiveKind`].
pub trait Primitive: Copy + Default + fmt::Debug + 'static {
    /// The kind this type is written as.
    const KIND: PrimitiveKind;

    /// Wraps the value.
    fn into_value(self) -> Value;

    /// Unwraps a value of the matching kind.
    ///
    /// # Errors
    /// Returns `UnsupportedType` when `value` is of another kind.
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_primitive {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Primitive for $t {
                const KIND: PrimitiveKind = PrimitiveKind::$variant;

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(SerializerError::UnsupportedType(format!(
                            "expected {}, got {}",
                            Self::KIND.name(),
                            other.kind().name()
                        ))),
                    }
                }
            }
        )*
    }
}

impl_primitive!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    U24 => U24,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Option<u8> => NullableU8,
);
