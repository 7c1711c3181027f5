//! Addresses inside the set of backing files.
//!
//! A [`Pointer`] names a byte location as `(file, offset, base address)`.
//! Pointers are plain values: they are created whenever a location is
//! computed and never change afterwards.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign};

use crate::graph::ObjectId;

/// A strong type identifying a backing file registered in a context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    /// Restricted to the crate so ids only come from a context's file table.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// A byte location in one backing file.
///
/// Two pointers only have an order when they share a file and base address;
/// `partial_cmp` returns `None` otherwise, so it agrees with `==`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    file: FileId,
    base_address: u64,
    file_offset: u64,
}

impl Pointer {
    /// Creates a pointer `file_offset` bytes into `file`, whose first byte is
    /// mapped at `base_address`.
    pub fn new(file: FileId, base_address: u64, file_offset: u64) -> Self {
        Self {
            file,
            base_address,
            file_offset,
        }
    }

    /// The file this pointer lives in.
    pub fn file(&self) -> FileId {
        self.file
    }

    /// Base address of the file.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Offset relative to the start of the file.
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    /// Address in the format's address space (`base_address + file_offset`).
    pub fn absolute(&self) -> u64 {
        self.base_address.wrapping_add(self.file_offset)
    }

    /// The value stored on disk for this pointer: the absolute address, or
    /// the distance from `anchor` when one is given.
    pub fn serialized_offset(&self, anchor: Option<&Pointer>) -> u64 {
        match anchor {
            Some(anchor) => self.absolute().wrapping_sub(anchor.absolute()),
            None => self.absolute(),
        }
    }

    /// Bytes from `earlier` to `self`, if both are in the same file and
    /// `earlier` does not lie past `self`.
    pub fn distance_from(&self, earlier: &Pointer) -> Option<u64> {
        if self.file != earlier.file {
            return None;
        }
        self.file_offset.checked_sub(earlier.file_offset)
    }
}

impl PartialOrd for Pointer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.file != other.file || self.base_address != other.base_address {
            return None;
        }
        Some(self.file_offset.cmp(&other.file_offset))
    }
}

impl Add<u64> for Pointer {
    type Output = Pointer;

    fn add(self, rhs: u64) -> Pointer {
        Pointer {
            file_offset: self.file_offset.wrapping_add(rhs),
            ..self
        }
    }
}

impl AddAssign<u64> for Pointer {
    fn add_assign(&mut self, rhs: u64) {
        self.file_offset = self.file_offset.wrapping_add(rhs);
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|0x{:08X}", self.file, self.absolute())
    }
}

/// A pointer that may also carry the object it points at.
///
/// The object lives in the context's arena; only its handle is stored here.
/// When a pointer of this kind is serialized with resolution requested, the
/// engine jumps to the address, writes the object there and comes back.
pub struct ObjectPointer<T> {
    pointer: Option<Pointer>,
    value: Option<ObjectId>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjectPointer<T> {
    /// A pointer to `value`, located at `pointer`.
    pub fn new(pointer: Option<Pointer>, value: Option<ObjectId>) -> Self {
        Self {
            pointer,
            value,
            _marker: PhantomData,
        }
    }

    /// A null pointer.
    pub fn null() -> Self {
        Self::new(None, None)
    }

    /// The address, if any.
    pub fn pointer(&self) -> Option<Pointer> {
        self.pointer
    }

    /// The attached object, if any.
    pub fn value(&self) -> Option<ObjectId> {
        self.value
    }

    /// True when no address is set.
    pub fn is_null(&self) -> bool {
        self.pointer.is_none()
    }
}

impl<T> Clone for ObjectPointer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectPointer<T> {}

impl<T> Default for ObjectPointer<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> PartialEq for ObjectPointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pointer == other.pointer && self.value == other.value
    }
}

impl<T> fmt::Debug for ObjectPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPointer")
            .field("pointer", &self.pointer)
            .field("value", &self.value)
            .finish()
    }
}
