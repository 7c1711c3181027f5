//! The serialization protocol.
//!
//! A structure's [`Serializable::serialize_impl`] speaks to a
//! `&mut dyn SerializerObject`. Every operation takes the in-memory value and
//! a diagnostic name and hands back the value the engine settled on: the
//! value itself when writing, the decoded value when reading. The same
//! description therefore drives both directions.
//!
//! [`SerializerObject`] is the object-safe core. [`SerializerExt`] adds the
//! typed conveniences (arrays, typed pointers, bit groups) on top of it and is
//! implemented for every serializer, including `dyn SerializerObject`.

use std::any::Any;
use std::borrow::Cow;

use crate::bits::set_bits;
use crate::checksum::{ChecksumCalculator, XorCalculator};
use crate::context::ContextId;
use crate::encoder::StreamEncoder;
use crate::error::{Result, SerializerError};
use crate::graph::ObjectId;
use crate::pointer::{ObjectPointer, Pointer};
use crate::primitive::{Endian, Primitive, PrimitiveKind, TextEncoding, Value};
use crate::serializable::Serializable;

/// A scoped action run against the serializer.
pub type Action<'a> = &'a mut dyn FnMut(&mut dyn SerializerObject) -> Result<()>;

/// A hook run on an object right before it is serialized.
pub type PreSerialize<'a> = &'a mut dyn FnMut(&mut dyn Serializable);

/// Options for resolving pointers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerOptions {
    /// Store the offset relative to this address instead of absolute.
    pub anchor: Option<Pointer>,
    /// Also serialize the attached object at the pointed-to address.
    pub resolve: bool,
}

impl PointerOptions {
    /// Absolute, unresolved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the offset relative to `anchor`.
    pub fn anchored(mut self, anchor: Pointer) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Requests resolution of the attached object.
    pub fn resolved(mut self) -> Self {
        self.resolve = true;
        self
    }
}

/// Options for encoded regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedOptions {
    /// Byte order inside the region. Defaults to the enclosing file's.
    pub endian: Option<Endian>,
    /// Name of the region's virtual file. Must not name a registered file.
    /// Defaults to `"<start pointer>_<encoder name>"`.
    pub key: Option<String>,
}

impl EncodedOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the byte order inside the region.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    /// Overrides the region's key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Accumulator handed to a bit-value group.
///
/// Fields are packed in call order starting at bit 0 of the backing integer.
#[derive(Debug)]
pub struct BitValues {
    packed: u64,
    position: u32,
    capacity: u32,
    entries: Option<Vec<(String, u64)>>,
}

impl BitValues {
    pub(crate) fn new(capacity: u32, record: bool) -> Self {
        Self {
            packed: 0,
            position: 0,
            capacity,
            entries: record.then(Vec::new),
        }
    }

    /// Packs the low `width` bits of `value` as the next field.
    ///
    /// # Panics
    ///
    /// Panics if the field does not fit in the backing integer.
    pub fn value(&mut self, value: u64, width: u32, name: &str) -> u64 {
        assert!(
            self.position + width <= self.capacity,
            "bit field '{name}' (width {width}) overflows the {}-bit group at bit {}",
            self.capacity,
            self.position
        );
        self.packed = set_bits(self.packed, value, width, self.position);
        if let Some(entries) = self.entries.as_mut() {
            entries.push((display_name(name).to_owned(), value));
        }
        self.position += width;
        value
    }

    /// Packs a single-bit flag.
    pub fn flag(&mut self, value: bool, name: &str) -> bool {
        self.value(u64::from(value), 1, name) != 0
    }

    /// Leaves `width` bits zero.
    pub fn skip(&mut self, width: u32) {
        self.value(0, width, "padding");
    }

    /// Next free bit.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// The packed integer so far.
    pub fn packed(&self) -> u64 {
        self.packed
    }

    pub(crate) fn take_entries(&mut self) -> Vec<(String, u64)> {
        self.entries.take().unwrap_or_default()
    }
}

/// Diagnostic name, with a placeholder for unnamed fields.
pub(crate) fn display_name(name: &str) -> &str {
    if name.is_empty() { "<no name>" } else { name }
}

fn element_name(log: bool, name: &str, index: usize) -> Cow<'_, str> {
    if log && !name.is_empty() {
        Cow::Owned(format!("{name}[{index}]"))
    } else {
        Cow::Borrowed(name)
    }
}

/// The object-safe serialization protocol.
pub trait SerializerObject {
    /// The context this serializer works in.
    fn context_id(&self) -> ContextId;

    /// Encoding used by string fields that do not name one.
    fn default_encoding(&self) -> TextEncoding;

    /// Address of the active target's cursor, or `None` without a target.
    fn current_pointer(&self) -> Option<Pointer>;

    /// Length of the active target.
    fn current_length(&self) -> Option<u64>;

    /// Moves to `offset`, switching targets when it lies in another file.
    /// `None` is a no-op.
    ///
    /// # Errors
    /// Returns `UnknownFile` if the pointer names an unregistered file.
    fn goto(&mut self, offset: Option<Pointer>) -> Result<()>;

    /// Runs `action` at `offset` and returns to the current position
    /// afterwards, also when `action` fails. `None` skips the action.
    ///
    /// # Errors
    /// Propagates the action's error, or a failure to move.
    fn do_at(&mut self, offset: Option<Pointer>, action: Action<'_>) -> Result<()>;

    /// Round-trips one scalar.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target, or `Io` on write failure.
    fn serialize_value(&mut self, value: Value, name: &str) -> Result<Value>;

    /// Round-trips a string: exactly `length` bytes when given, otherwise
    /// terminated. `None` encoding means the context default.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn serialize_string(
        &mut self,
        text: &str,
        length: Option<usize>,
        encoding: Option<TextEncoding>,
        name: &str,
    ) -> Result<String>;

    /// Round-trips `count` raw bytes. `bytes` is resized to `count`.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn serialize_bytes(&mut self, bytes: &mut Vec<u8>, count: usize, name: &str) -> Result<()>;

    /// Serializes an owned nested object in place.
    ///
    /// # Errors
    /// Propagates the object's own errors.
    fn serialize_object(&mut self, object: &mut dyn Serializable, name: &str) -> Result<()>;

    /// Serializes a shared object from the context's arena at the current
    /// position. Objects already written in this pass are skipped over.
    ///
    /// # Errors
    /// Returns `Internal` for ids not in the arena, or the object's own errors.
    fn serialize_shared(
        &mut self,
        id: ObjectId,
        pre_serialize: Option<PreSerialize<'_>>,
        name: &str,
    ) -> Result<()>;

    /// Round-trips a plain pointer as a 4-byte offset; `None` is zero.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` if the offset does not fit in 4 bytes.
    fn serialize_pointer(
        &mut self,
        pointer: Option<Pointer>,
        anchor: Option<Pointer>,
        name: &str,
    ) -> Result<Option<Pointer>>;

    /// Round-trips a resolving pointer: its offset field, and, when
    /// requested and an object is attached, the object at that address.
    ///
    /// # Errors
    /// As [`serialize_pointer`](Self::serialize_pointer) and
    /// [`serialize_shared`](Self::serialize_shared).
    fn serialize_resolving_pointer(
        &mut self,
        pointer: Option<Pointer>,
        target: Option<ObjectId>,
        options: PointerOptions,
        pre_serialize: Option<PreSerialize<'_>>,
        name: &str,
    ) -> Result<()>;

    /// Packs the fields `fields` declares into one integer of `kind`.
    ///
    /// # Errors
    /// Returns `UnsupportedType` if `kind` is not an integer kind.
    fn serialize_bit_values(
        &mut self,
        kind: PrimitiveKind,
        fields: &mut dyn FnMut(&mut BitValues) -> Result<()>,
    ) -> Result<()>;

    /// Starts a checksum over all bytes that follow.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn begin_calculate_checksum(&mut self, calculator: Box<dyn ChecksumCalculator>) -> Result<()>;

    /// Stops the checksum and returns its value.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn end_calculate_checksum(&mut self) -> Result<Option<u64>>;

    /// Starts XOR-transforming all bytes that follow.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn begin_xor(&mut self, calculator: Box<dyn XorCalculator>) -> Result<()>;

    /// Stops the XOR transform and hands the calculator back.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target.
    fn end_xor(&mut self) -> Result<Option<Box<dyn XorCalculator>>>;

    /// The active XOR calculator.
    fn get_xor(&self) -> Option<&dyn XorCalculator>;

    /// Runs `action` inside an encoded region and writes the encoded result
    /// at the current position.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target, `UnsupportedFormat` if the
    /// key names a registered file, `Encoding` if the encoder fails, or the
    /// action's error.
    fn do_encoded(
        &mut self,
        encoder: &dyn StreamEncoder,
        options: EncodedOptions,
        action: Action<'_>,
    ) -> Result<()>;

    /// Opens an encoded region and makes it the active target. Returns the
    /// region's start address.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target, or `UnsupportedFormat` if
    /// the key names a registered file.
    fn begin_encoded(
        &mut self,
        encoder: Box<dyn StreamEncoder>,
        options: EncodedOptions,
    ) -> Result<Pointer>;

    /// Closes the region `end` lies in and appends its encoded bytes where
    /// the region began. Unknown regions are ignored.
    ///
    /// # Errors
    /// Returns `Encoding` if the encoder fails.
    fn end_encoded(&mut self, end: &Pointer) -> Result<()>;

    /// Runs `action` with the active target's byte order set to `endian`.
    ///
    /// # Errors
    /// Returns `NoActiveTarget` without a target, or the action's error.
    fn do_endian(&mut self, endian: Endian, action: Action<'_>) -> Result<()>;

    /// Appends a diagnostic line.
    fn log(&mut self, line: &str);

    /// True when diagnostic lines are recorded.
    fn is_log_enabled(&self) -> bool;
}

/// Typed conveniences over [`SerializerObject`].
pub trait SerializerExt: SerializerObject {
    /// Round-trips one scalar.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_value`].
    fn serialize<T: Primitive>(&mut self, value: T, name: &str) -> Result<T> {
        T::from_value(self.serialize_value(value.into_value(), name)?)
    }

    /// Writes a checksum computed earlier.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_value`].
    fn serialize_checksum<T: Primitive>(&mut self, checksum: T, name: &str) -> Result<T> {
        self.serialize(checksum, name)
    }

    /// Stops the checksum and returns it as `T`. Zero if none was running.
    ///
    /// # Errors
    /// Returns `UnsupportedType` if `T` is not an integer type.
    fn end_checksum<T: Primitive>(&mut self) -> Result<T> {
        match self.end_calculate_checksum()? {
            Some(sum) => T::from_value(Value::from_bits(T::KIND, sum)?),
            None => Ok(T::default()),
        }
    }

    /// Serializes an owned object after running `pre_serialize` on it.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_object`].
    fn serialize_object_with<T: Serializable>(
        &mut self,
        object: &mut T,
        pre_serialize: impl FnOnce(&mut T),
        name: &str,
    ) -> Result<()> {
        pre_serialize(&mut *object);
        self.serialize_object(object, name)
    }

    /// Round-trips `count` scalars. Byte arrays are moved in one block.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_value`].
    fn serialize_array<T: Primitive>(
        &mut self,
        values: &mut Vec<T>,
        count: usize,
        name: &str,
    ) -> Result<()> {
        if let Some(bytes) = (&mut *values as &mut dyn Any).downcast_mut::<Vec<u8>>() {
            return self.serialize_bytes(bytes, count, name);
        }
        values.resize(count, T::default());

        let log = self.is_log_enabled();
        if log {
            self.log(&format!(
                "({}[{count}]) {}",
                T::KIND.name(),
                display_name(name)
            ));
        }
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.serialize(*value, &element_name(log, name, i))?;
        }
        Ok(())
    }

    /// Serializes `count` owned objects in order.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_object`].
    fn serialize_object_array<T: Serializable + Default>(
        &mut self,
        objects: &mut Vec<T>,
        count: usize,
        name: &str,
    ) -> Result<()> {
        objects.resize_with(count, T::default);

        let log = self.is_log_enabled();
        if log {
            self.log(&format!(
                "(Object[] {}[{count}]) {}",
                std::any::type_name::<T>(),
                display_name(name)
            ));
        }
        for (i, object) in objects.iter_mut().enumerate() {
            self.serialize_object(object, &element_name(log, name, i))?;
        }
        Ok(())
    }

    /// Round-trips `count` strings.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_string`].
    fn serialize_string_array(
        &mut self,
        strings: &mut Vec<String>,
        count: usize,
        length: Option<usize>,
        encoding: Option<TextEncoding>,
        name: &str,
    ) -> Result<()> {
        strings.resize_with(count, String::new);

        let log = self.is_log_enabled();
        if log {
            self.log(&format!("(String[{count}]) {}", display_name(name)));
        }
        for (i, text) in strings.iter_mut().enumerate() {
            *text = self.serialize_string(text, length, encoding, &element_name(log, name, i))?;
        }
        Ok(())
    }

    /// Round-trips `count` plain pointers.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_pointer`].
    fn serialize_pointer_array(
        &mut self,
        pointers: &mut Vec<Option<Pointer>>,
        count: usize,
        anchor: Option<Pointer>,
        name: &str,
    ) -> Result<()> {
        pointers.resize(count, None);

        let log = self.is_log_enabled();
        if log {
            self.log(&format!("(Pointer[{count}]) {}", display_name(name)));
        }
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = self.serialize_pointer(*pointer, anchor, &element_name(log, name, i))?;
        }
        Ok(())
    }

    /// Round-trips a typed resolving pointer.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_resolving_pointer`].
    fn serialize_object_pointer<T: Serializable>(
        &mut self,
        pointer: ObjectPointer<T>,
        options: PointerOptions,
        name: &str,
    ) -> Result<ObjectPointer<T>> {
        self.serialize_resolving_pointer(pointer.pointer(), pointer.value(), options, None, name)?;
        Ok(pointer)
    }

    /// Like [`serialize_object_pointer`](Self::serialize_object_pointer),
    /// running `pre_serialize` on the pointee before it is written.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_resolving_pointer`].
    fn serialize_object_pointer_with<T: Serializable>(
        &mut self,
        pointer: ObjectPointer<T>,
        options: PointerOptions,
        mut pre_serialize: impl FnMut(&mut T),
        name: &str,
    ) -> Result<ObjectPointer<T>> {
        let mut hook = |object: &mut dyn Serializable| {
            if let Some(typed) = object.as_any_mut().downcast_mut::<T>() {
                pre_serialize(typed);
            }
        };
        self.serialize_resolving_pointer(
            pointer.pointer(),
            pointer.value(),
            options,
            Some(&mut hook),
            name,
        )?;
        Ok(pointer)
    }

    /// Round-trips `count` typed resolving pointers.
    ///
    /// # Errors
    /// As [`SerializerObject::serialize_resolving_pointer`].
    fn serialize_object_pointer_array<T: Serializable>(
        &mut self,
        pointers: &mut Vec<ObjectPointer<T>>,
        count: usize,
        options: PointerOptions,
        name: &str,
    ) -> Result<()> {
        pointers.resize(count, ObjectPointer::null());

        let log = self.is_log_enabled();
        if log {
            self.log(&format!(
                "(Pointer<{}>[{count}]) {}",
                std::any::type_name::<T>(),
                display_name(name)
            ));
        }
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = self.serialize_object_pointer(*pointer, options, &element_name(log, name, i))?;
        }
        Ok(())
    }

    /// Writes the length of `items` as a `U`, named `"<name>.Length"`.
    ///
    /// # Errors
    /// Returns `UnsupportedType` if `U` is not an integer type, and
    /// `UnsupportedFormat` if the length does not fit in a `U`. Nothing is
    /// written in either case.
    fn serialize_array_size<U: Primitive, T>(&mut self, items: &[T], name: &str) -> Result<usize> {
        let len = items.len() as u64;
        let value = Value::from_bits(U::KIND, len)?;
        if value.to_bits()? != len || value.is_negative() {
            return Err(SerializerError::UnsupportedFormat {
                object: display_name(name).to_owned(),
                message: format!("length {len} does not fit in {}", U::KIND.name()),
            });
        }
        self.serialize(U::from_value(value)?, &format!("{name}.Length"))?;
        Ok(items.len())
    }

    /// Packs a group of bit fields into one `T`.
    ///
    /// # Errors
    /// Returns `UnsupportedType` if `T` is not an integer type, or the
    /// closure's error.
    fn serialize_bits<T: Primitive>(
        &mut self,
        mut fields: impl FnMut(&mut BitValues) -> Result<()>,
    ) -> Result<()> {
        self.serialize_bit_values(T::KIND, &mut fields)
    }
}

impl<S: SerializerObject + ?Sized> SerializerExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_values_pack_from_bit_zero() {
        let mut bits = BitValues::new(16, false);
        bits.value(0b101, 3, "a");
        bits.flag(true, "b");
        bits.value(0xF, 4, "c");
        assert_eq!(bits.position(), 8);
        assert_eq!(bits.packed(), 0b1111_1_101);
    }

    #[test]
    fn bit_values_record_entries_on_request() {
        let mut bits = BitValues::new(8, true);
        bits.value(2, 2, "");
        assert_eq!(bits.take_entries(), vec![("<no name>".to_owned(), 2)]);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn overfull_group_is_a_bug() {
        let mut bits = BitValues::new(8, false);
        bits.value(0, 6, "a");
        bits.value(0, 3, "b");
    }

    #[test]
    fn element_names_are_only_built_for_logging() {
        assert_eq!(element_name(true, "x", 2), "x[2]");
        assert_eq!(element_name(false, "x", 2), "x");
    }
}
