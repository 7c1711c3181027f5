#![allow(missing_docs)]

//! End-to-end tests of the write engine over in-memory files.

use binser::color::{ChannelFormat, ColorFormat, ColorLayout, PackedColor, Rgba5551};
use binser::{
    Binser, ByteSumChecksum, Color, Context, CustomColor, Endian, FileId, MemoryFile,
    ObjectState, Pointer, Result, Serializable, SerializerError, SerializerExt,
    SerializerObject, TextEncoding, U24, Xor8Calculator,
};

// --- HELPERS ---

fn memory_context(endian: Endian) -> (Context, FileId, Pointer) {
    let mut ctx = Context::default();
    let file = ctx.add_file(MemoryFile::new("main").with_endianness(endian));
    let start = ctx.file_pointer(file).expect("file was just added");
    (ctx, file, start)
}

fn bytes_of(ctx: &Context, file: FileId) -> Vec<u8> {
    ctx.file_as::<MemoryFile>(file)
        .expect("memory file")
        .data()
        .to_vec()
}

// --- MOCK STRUCTURES ---

#[derive(Debug, Default)]
struct Texel {
    state: ObjectState,
    color: PackedColor<Rgba5551>,
    tag: u8,
}

impl Serializable for Texel {
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        s.serialize_object(&mut self.color, "color")?;
        self.tag = s.serialize(self.tag, "tag")?;
        Ok(())
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

#[derive(Debug, Default)]
struct Record {
    state: ObjectState,
    values: Vec<u16>,
    raw: Vec<u8>,
    names: Vec<String>,
    optional: [Option<u8>; 2],
}

impl Serializable for Record {
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        let count = s.serialize_array_size::<u8, _>(&self.values, "values")?;
        s.serialize_array(&mut self.values, count, "values")?;
        s.serialize_array(&mut self.raw, 3, "raw")?;
        s.serialize_string_array(&mut self.names, 2, Some(3), None, "names")?;
        for (i, slot) in self.optional.iter_mut().enumerate() {
            *slot = s.serialize(*slot, &format!("optional{i}"))?;
        }
        Ok(())
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }
}

#[derive(Debug, Clone, Copy)]
struct Wide;

impl ColorLayout for Wide {
    const FORMAT: ColorFormat = ColorFormat::new(
        "RGB16_16_8",
        Some(ChannelFormat::new(0, 16)),
        Some(ChannelFormat::new(16, 16)),
        Some(ChannelFormat::new(32, 8)),
        None,
    );
}

// --- TESTS ---

#[test]
fn packed_color_lands_as_little_endian_u16() -> Result<()> {
    let mut texel = Texel {
        color: PackedColor::from_rgba(1.0, 0.0, 1.0, 1.0),
        tag: 0x42,
        ..Texel::default()
    };
    let bytes = Binser::to_bytes(&mut texel, Endian::Little)?;
    assert_eq!(bytes, [0x1F, 0x80, 0x42]);
    assert_eq!(texel.size(), 3);
    assert_eq!(texel.color.size(), 2);
    Ok(())
}

#[test]
fn custom_colors_cannot_be_written() {
    let mut color: Color<Rgba5551> = CustomColor::WHITE.into();
    assert!(matches!(
        Binser::to_bytes(&mut color, Endian::Little),
        Err(SerializerError::NotSerializable(_))
    ));

    let mut packed = Color::<Rgba5551>::Custom(CustomColor::WHITE).to_packed();
    assert_eq!(
        Binser::to_bytes(&mut packed, Endian::Big).ok(),
        Some(vec![0xFF, 0xFF])
    );
}

#[test]
fn wide_color_layouts_are_rejected() {
    let mut color = PackedColor::<Wide>::from_value(0);
    assert!(matches!(
        Binser::to_bytes(&mut color, Endian::Little),
        Err(SerializerError::UnsupportedFormat { .. })
    ));
}

#[test]
fn arrays_strings_and_nullable_bytes() -> Result<()> {
    let mut record = Record {
        values: vec![0x0102, 0x0304],
        raw: vec![0xAA],
        names: vec!["abcdef".into()],
        optional: [None, Some(3)],
        ..Record::default()
    };
    let bytes = Binser::to_bytes(&mut record, Endian::Big)?;
    assert_eq!(
        bytes,
        [
            2, // values.Length
            0x01, 0x02, 0x03, 0x04, // values
            0xAA, 0x00, 0x00, // raw, padded to count
            b'a', b'b', b'c', // names[0], truncated
            0, 0, 0, // names[1], defaulted
            0xFF, 0x03, // optional
        ]
    );
    assert_eq!(record.raw.len(), 3);
    assert_eq!(record.names, ["abcdef", ""]);
    Ok(())
}

#[test]
fn array_lengths_must_fit_their_field() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    let items = vec![0u8; 300];
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        assert!(matches!(
            s.serialize_array_size::<u8, _>(&items, "items"),
            Err(SerializerError::UnsupportedFormat { .. })
        ));
        // Positive lengths must not flip the sign of a signed field.
        assert!(matches!(
            s.serialize_array_size::<i8, _>(&items[..200], "items"),
            Err(SerializerError::UnsupportedFormat { .. })
        ));
        assert_eq!(s.current_pointer(), Some(start));
        assert_eq!(s.serialize_array_size::<u16, _>(&items, "items")?, 300);
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0x2C, 0x01]);
    Ok(())
}

#[test]
fn terminated_strings_follow_their_encoding() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.serialize_string("hi", None, None, "utf8")?;
        s.serialize_string("A", None, Some(TextEncoding::Utf16Be), "utf16")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [b'h', b'i', 0, 0x00, 0x41, 0x00, 0x00]);
    Ok(())
}

#[test]
fn odd_width_integers() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Big);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.serialize(U24::new(0x0A0B0C), "u24")?;
        s.serialize(-2i16, "i16")?;
        s.serialize(true, "flag")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0x0A, 0x0B, 0x0C, 0xFF, 0xFE, 0x01]);
    Ok(())
}

#[test]
fn bit_groups_pack_from_the_low_bit() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.serialize_bits::<u16>(|bits| {
            bits.value(0b101, 3, "kind");
            bits.flag(true, "visible");
            bits.value(0xF, 4, "layer");
            bits.skip(4);
            bits.value(0x3, 4, "priority");
            Ok(())
        })?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0xFD, 0x30]);
    Ok(())
}

#[test]
fn bit_groups_need_an_integer_backing() -> Result<()> {
    let (mut ctx, _, start) = memory_context(Endian::Little);
    let mut s = ctx.serializer();
    s.goto(Some(start))?;
    let mut ran = false;
    let result = s.serialize_bits::<f32>(|_| {
        ran = true;
        Ok(())
    });
    assert!(matches!(result, Err(SerializerError::UnsupportedType(_))));
    assert!(!ran);
    assert_eq!(s.current_length(), Some(0));
    Ok(())
}

#[test]
fn endian_scope_reverses_and_restores() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.do_endian(Endian::Big, &mut |s: &mut dyn SerializerObject| {
            s.serialize(0x1234u16, "inner")?;
            Ok(())
        })?;
        s.serialize(0x1234u16, "outer")?;

        let failed = s.do_endian(Endian::Big, &mut |_: &mut dyn SerializerObject| {
            Err(SerializerError::Internal("boom".into()))
        });
        assert!(failed.is_err());
        s.serialize(0x1234u16, "after_error")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0x12, 0x34, 0x34, 0x12, 0x34, 0x12]);
    Ok(())
}

#[test]
fn endian_scope_needs_a_target() {
    let mut ctx = Context::default();
    let mut s = ctx.serializer();
    let result = s.do_endian(Endian::Big, &mut |_: &mut dyn SerializerObject| Ok(()));
    assert!(matches!(result, Err(SerializerError::NoActiveTarget)));
}

#[test]
fn checksum_covers_the_span_it_was_running() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.serialize(0xEEu8, "before")?;
        s.begin_calculate_checksum(Box::new(ByteSumChecksum::new(16)))?;
        s.serialize_array(&mut vec![0xFFu8, 0x02, 0x03], 3, "payload")?;
        let sum: u16 = s.end_checksum()?;
        s.serialize_checksum(sum, "checksum")?;

        let none: u16 = s.end_checksum()?;
        assert_eq!(none, 0);
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0xEE, 0xFF, 0x02, 0x03, 0x04, 0x01]);
    Ok(())
}

#[test]
fn xor_scope_transforms_and_checksums_the_plain_bytes() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.begin_calculate_checksum(Box::new(ByteSumChecksum::new(8)))?;
        s.begin_xor(Box::new(Xor8Calculator::new(0xAA)))?;
        assert!(s.get_xor().is_some());
        s.serialize(0x0Fu8, "secret")?;
        assert!(s.end_xor()?.is_some());
        assert!(s.get_xor().is_none());
        let sum: u8 = s.end_checksum()?;
        s.serialize(sum, "checksum")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0xA5, 0x0F]);
    Ok(())
}

#[test]
fn checksum_over_encrypted_bytes() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.begin_calculate_checksum(Box::new(ByteSumChecksum::new(8).over_encrypted()))?;
        s.begin_xor(Box::new(Xor8Calculator::new(0xF0)))?;
        s.serialize(0x01u8, "secret")?;
        s.end_xor()?;
        let sum: u8 = s.end_checksum()?;
        s.serialize(sum, "checksum")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0xF1, 0xF1]);
    Ok(())
}

#[test]
fn scoped_jumps_return_even_on_error() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start + 2))?;

        let failed = s.do_at(Some(start + 8), &mut |s: &mut dyn SerializerObject| {
            s.serialize(1u8, "partial")?;
            Err(SerializerError::Internal("boom".into()))
        });
        assert!(matches!(failed, Err(SerializerError::Internal(_))));
        assert_eq!(s.current_pointer(), Some(start + 2));

        s.do_at(None, &mut |_: &mut dyn SerializerObject| {
            Err(SerializerError::Internal("never runs".into()))
        })?;
        s.serialize(7u8, "here")?;
        s.dispose()?;
    }
    assert_eq!(bytes_of(&ctx, file), [0, 0, 7, 0, 0, 0, 0, 0, 1]);
    Ok(())
}

#[test]
fn writes_overwrite_existing_contents_in_place() -> Result<()> {
    let mut ctx = Context::default();
    let file = ctx.add_file(MemoryFile::new("seeded").with_data(vec![9; 6]));
    let start = ctx.file_pointer(file)?;
    {
        let mut s = ctx.serializer();
        s.goto(Some(start + 1))?;
        s.serialize(0u16, "hole")?;
        assert!(s.dispose_file(file)?);
        assert!(!s.dispose_file(file)?);
        assert_eq!(
            s.context().file_as::<MemoryFile>(file).map(MemoryFile::data),
            Some(&[9u8, 0, 0, 9, 9, 9][..])
        );
    }
    Ok(())
}

#[test]
fn dropping_the_engine_finalizes_its_targets() -> Result<()> {
    let (mut ctx, file, start) = memory_context(Endian::Little);
    {
        let mut s = ctx.serializer();
        s.goto(Some(start))?;
        s.serialize(0xBEEFu16, "magic")?;
    }
    assert_eq!(bytes_of(&ctx, file), [0xEF, 0xBE]);
    Ok(())
}
