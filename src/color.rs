//! Channel-packed colors.
//!
//! A packed color is an integer whose bits are split into red, green, blue and
//! alpha channels. Where each channel lives is data: a [`ColorFormat`] table of
//! `(offset, width)` pairs, attached to the color type through a
//! [`ColorLayout`] marker. Layout names list channels from bit 0 upwards, so
//! in [`Rgba5551`] red occupies bits 0-4 and alpha bit 15.
//!
//! Channels missing from a layout read as 0.0 (1.0 for alpha), and writes to
//! them are dropped.
//!
//! ```rust
//! use binser::color::{ColorChannel, PackedColor, Rgba5551};
//!
//! let c = PackedColor::<Rgba5551>::from_rgba(1.0, 0.0, 1.0, 1.0);
//! assert_eq!(c.value(), 0x801F);
//! assert_eq!(c.get(ColorChannel::Green), 0.0);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::bits::{extract_bits, set_bits};
use crate::constants::MAX_PACKED_COLOR_BITS;
use crate::error::{Result, SerializerError};
use crate::primitive::{PrimitiveKind, Value};
use crate::serializable::{ObjectState, Serializable};
use crate::serializer::SerializerObject;

/// One color component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorChannel {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Alpha (opacity).
    Alpha,
}

impl ColorChannel {
    /// Every channel, in table order.
    pub const ALL: [Self; 4] = [Self::Red, Self::Green, Self::Blue, Self::Alpha];

    fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Alpha => 3,
        }
    }

    /// Value reported for a channel the layout does not store.
    pub fn default_value(self) -> f32 {
        if self == Self::Alpha { 1.0 } else { 0.0 }
    }
}

/// Placement of one channel inside the backing integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelFormat {
    /// First bit of the channel.
    pub offset: u8,
    /// Number of bits.
    pub width: u8,
}

impl ChannelFormat {
    /// Creates a placement.
    pub const fn new(offset: u8, width: u8) -> Self {
        Self { offset, width }
    }

    /// One past the channel's highest bit.
    pub const fn end(self) -> u32 {
        self.offset as u32 + self.width as u32
    }

    #[allow(clippy::cast_precision_loss)]
    fn max_level(self) -> f32 {
        ((1u64 << self.width) - 1) as f32
    }
}

/// A table mapping each channel to its bits, or to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorFormat {
    name: &'static str,
    channels: [Option<ChannelFormat>; 4],
}

const fn ch(offset: u8, width: u8) -> Option<ChannelFormat> {
    Some(ChannelFormat::new(offset, width))
}

impl ColorFormat {
    /// 5 bits per color channel, 1 alpha bit.
    pub const RGBA_5551: Self = Self::new("RGBA5551", ch(0, 5), ch(5, 5), ch(10, 5), ch(15, 1));
    /// 5 bits per color channel, no alpha.
    pub const RGB_555: Self = Self::new("RGB555", ch(0, 5), ch(5, 5), ch(10, 5), None);
    /// 5/6/5 bits, red lowest.
    pub const RGB_565: Self = Self::new("RGB565", ch(0, 5), ch(5, 6), ch(11, 5), None);
    /// 5/6/5 bits, blue lowest.
    pub const BGR_565: Self = Self::new("BGR565", ch(11, 5), ch(5, 6), ch(0, 5), None);
    /// 4 bits per channel.
    pub const RGBA_4444: Self = Self::new("RGBA4444", ch(0, 4), ch(4, 4), ch(8, 4), ch(12, 4));
    /// 8 bits per color channel, no alpha.
    pub const RGB_888: Self = Self::new("RGB888", ch(0, 8), ch(8, 8), ch(16, 8), None);
    /// 8 bits per color channel, blue lowest, no alpha.
    pub const BGR_888: Self = Self::new("BGR888", ch(16, 8), ch(8, 8), ch(0, 8), None);
    /// 8 bits per channel.
    pub const RGBA_8888: Self = Self::new("RGBA8888", ch(0, 8), ch(8, 8), ch(16, 8), ch(24, 8));
    /// 8 bits per channel, blue lowest.
    pub const BGRA_8888: Self = Self::new("BGRA8888", ch(16, 8), ch(8, 8), ch(0, 8), ch(24, 8));
    /// 8 bits per channel, alpha lowest.
    pub const ABGR_8888: Self = Self::new("ABGR8888", ch(24, 8), ch(16, 8), ch(8, 8), ch(0, 8));

    /// Builds a table. Channels must not overlap.
    pub const fn new(
        name: &'static str,
        red: Option<ChannelFormat>,
        green: Option<ChannelFormat>,
        blue: Option<ChannelFormat>,
        alpha: Option<ChannelFormat>,
    ) -> Self {
        Self {
            name,
            channels: [red, green, blue, alpha],
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Where `channel` is stored, if at all.
    pub fn channel(&self, channel: ColorChannel) -> Option<ChannelFormat> {
        self.channels[channel.index()]
    }

    /// Highest bit used by any channel, plus one.
    pub fn bit_width(&self) -> u32 {
        self.channels
            .iter()
            .flatten()
            .map(|c| c.end())
            .max()
            .unwrap_or(0)
    }

    /// Smallest supported integer that holds every channel.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for layouts wider than 32 bits.
    pub fn storage(&self) -> Result<PrimitiveKind> {
        Ok(match self.bit_width() {
            0..=8 => PrimitiveKind::U8,
            9..=16 => PrimitiveKind::U16,
            17..=24 => PrimitiveKind::U24,
            25..=MAX_PACKED_COLOR_BITS => PrimitiveKind::U32,
            bits => {
                return Err(SerializerError::UnsupportedFormat {
                    object: format!("color layout {}", self.name),
                    message: format!(
                        "{bits} bits exceed the {MAX_PACKED_COLOR_BITS}-bit maximum"
                    ),
                });
            }
        })
    }
}

/// Attaches a [`ColorFormat`] to a color type at compile time.
pub trait ColorLayout: fmt::Debug + Clone + Copy + Send + Sync + 'static {
    /// The channel table.
    const FORMAT: ColorFormat;
}

macro_rules! color_layouts {
    ($($(#[$doc:meta])* $marker:ident => $format:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $marker;

            impl ColorLayout for $marker {
                const FORMAT: ColorFormat = ColorFormat::$format;
            }
        )*
    };
}

color_layouts!(
    /// See [`ColorFormat::RGBA_5551`].
    Rgba5551 => RGBA_5551,
    /// See [`ColorFormat::RGB_555`].
    Rgb555 => RGB_555,
    /// See [`ColorFormat::RGB_565`].
    Rgb565 => RGB_565,
    /// See [`ColorFormat::BGR_565`].
    Bgr565 => BGR_565,
    /// See [`ColorFormat::RGBA_4444`].
    Rgba4444 => RGBA_4444,
    /// See [`ColorFormat::RGB_888`].
    Rgb888 => RGB_888,
    /// See [`ColorFormat::BGR_888`].
    Bgr888 => BGR_888,
    /// See [`ColorFormat::RGBA_8888`].
    Rgba8888 => RGBA_8888,
    /// See [`ColorFormat::BGRA_8888`].
    Bgra8888 => BGRA_8888,
    /// See [`ColorFormat::ABGR_8888`].
    Abgr8888 => ABGR_8888,
);

/// Read access to the four canonical channels, each in `0.0..=1.0`.
pub trait Rgba {
    /// Value of one channel.
    fn channel(&self, channel: ColorChannel) -> f32;

    /// Red channel.
    fn red(&self) -> f32 {
        self.channel(ColorChannel::Red)
    }

    /// Green channel.
    fn green(&self) -> f32 {
        self.channel(ColorChannel::Green)
    }

    /// Blue channel.
    fn blue(&self) -> f32 {
        self.channel(ColorChannel::Blue)
    }

    /// Alpha channel.
    fn alpha(&self) -> f32 {
        self.channel(ColorChannel::Alpha)
    }

    /// The four channels in RGBA order.
    fn to_array(&self) -> [f32; 4] {
        ColorChannel::ALL.map(|c| self.channel(c))
    }
}

fn same_rgba(a: &impl Rgba, b: &impl Rgba) -> bool {
    a.to_array() == b.to_array()
}

/// `RGBA(r, g, b, a)` with color channels scaled to 0-255 and alpha as is.
#[allow(clippy::cast_possible_truncation)]
fn fmt_rgba(color: &impl Rgba, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "RGBA({}, {}, {}, {})",
        (color.red() * 255.0) as i32,
        (color.green() * 255.0) as i32,
        (color.blue() * 255.0) as i32,
        color.alpha()
    )
}

/// A color stored as bit fields of one integer.
pub struct PackedColor<L: ColorLayout> {
    value: u32,
    state: ObjectState,
    _layout: PhantomData<L>,
}

impl<L: ColorLayout> PackedColor<L> {
    /// Wraps a raw backing integer.
    pub fn from_value(value: u32) -> Self {
        Self {
            value,
            state: ObjectState::new(),
            _layout: PhantomData,
        }
    }

    /// Quantizes four channels into the layout.
    pub fn from_rgba(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        let mut color = Self::from_value(0);
        color.set(ColorChannel::Red, red);
        color.set(ColorChannel::Green, green);
        color.set(ColorChannel::Blue, blue);
        color.set(ColorChannel::Alpha, alpha);
        color
    }

    /// Converts any color into this layout.
    pub fn from_color(color: &impl Rgba) -> Self {
        let [r, g, b, a] = color.to_array();
        Self::from_rgba(r, g, b, a)
    }

    /// The backing integer.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Replaces the backing integer.
    pub fn set_value(&mut self, value: u32) {
        self.value = value;
    }

    /// The layout's table.
    pub fn format(&self) -> ColorFormat {
        L::FORMAT
    }

    /// Decodes one channel.
    #[allow(clippy::cast_precision_loss)]
    pub fn get(&self, channel: ColorChannel) -> f32 {
        match L::FORMAT.channel(channel) {
            Some(c) => {
                let level = extract_bits(u64::from(self.value), u32::from(c.width), u32::from(c.offset));
                level as f32 / c.max_level()
            }
            None => channel.default_value(),
        }
    }

    /// Encodes one channel, rounding to the nearest level. Values outside
    /// `0.0..=1.0` are clamped; channels the layout lacks are ignored.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set(&mut self, channel: ColorChannel, value: f32) {
        let Some(c) = L::FORMAT.channel(channel) else {
            return;
        };
        let level = (value.clamp(0.0, 1.0) * c.max_level()).round() as u64;
        let packed = set_bits(
            u64::from(self.value),
            level,
            u32::from(c.width),
            u32::from(c.offset),
        );
        self.value = packed as u32;
    }
}

impl<L: ColorLayout> Default for PackedColor<L> {
    /// Opaque black.
    fn default() -> Self {
        Self::from_rgba(0.0, 0.0, 0.0, 1.0)
    }
}

impl<L: ColorLayout> Clone for PackedColor<L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: ColorLayout> Copy for PackedColor<L> {}

impl<L: ColorLayout> fmt::Debug for PackedColor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedColor")
            .field("format", &L::FORMAT.name)
            .field("value", &format_args!("0x{:X}", self.value))
            .finish()
    }
}

impl<L: ColorLayout> fmt::Display for PackedColor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rgba(self, f)
    }
}

impl<L: ColorLayout> Rgba for PackedColor<L> {
    fn channel(&self, channel: ColorChannel) -> f32 {
        self.get(channel)
    }
}

impl<L: ColorLayout, M: ColorLayout> PartialEq<PackedColor<M>> for PackedColor<L> {
    fn eq(&self, other: &PackedColor<M>) -> bool {
        same_rgba(self, other)
    }
}

// Decoded channels are never NaN.
impl<L: ColorLayout> Eq for PackedColor<L> {}

impl<L: ColorLayout> Hash for PackedColor<L> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in self.to_array() {
            value.to_bits().hash(state);
        }
    }
}

impl<L: ColorLayout> PartialEq<CustomColor> for PackedColor<L> {
    fn eq(&self, other: &CustomColor) -> bool {
        same_rgba(self, other)
    }
}

impl<L: ColorLayout> Serializable for PackedColor<L> {
    #[allow(clippy::cast_possible_truncation)]
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        let kind = L::FORMAT.storage()?;
        let stored = s.serialize_value(Value::from_bits(kind, u64::from(self.value))?, "value")?;
        // Storage kinds are at most 32 bits wide.
        self.value = stored.to_bits()? as u32;
        Ok(())
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    fn is_short_log(&self) -> bool {
        true
    }

    fn short_log(&self) -> String {
        self.to_string()
    }
}

/// A color with four free floating-point channels.
///
/// Has no binary encoding; it exists for constants and for building colors
/// before converting them to a packed layout.
#[derive(Debug, Clone, Copy)]
pub struct CustomColor {
    /// Red.
    pub red: f32,
    /// Green.
    pub green: f32,
    /// Blue.
    pub blue: f32,
    /// Alpha.
    pub alpha: f32,
    state: ObjectState,
}

impl CustomColor {
    /// Fully transparent black.
    pub const CLEAR: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a color.
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
            state: ObjectState::new(),
        }
    }
}

impl Default for CustomColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Rgba for CustomColor {
    fn channel(&self, channel: ColorChannel) -> f32 {
        match channel {
            ColorChannel::Red => self.red,
            ColorChannel::Green => self.green,
            ColorChannel::Blue => self.blue,
            ColorChannel::Alpha => self.alpha,
        }
    }
}

impl fmt::Display for CustomColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rgba(self, f)
    }
}

impl PartialEq for CustomColor {
    fn eq(&self, other: &Self) -> bool {
        same_rgba(self, other)
    }
}

impl<L: ColorLayout> PartialEq<PackedColor<L>> for CustomColor {
    fn eq(&self, other: &PackedColor<L>) -> bool {
        same_rgba(self, other)
    }
}

/// A color field that may hold either representation.
///
/// Only the packed form can be serialized; a custom color fails with
/// `NotSerializable`.
#[derive(Debug, Clone, Copy)]
pub enum Color<L: ColorLayout> {
    /// Bit-packed in layout `L`.
    Packed(PackedColor<L>),
    /// Free floating-point channels.
    Custom(CustomColor),
}

impl<L: ColorLayout> Color<L> {
    /// The color quantized into layout `L`.
    pub fn to_packed(&self) -> PackedColor<L> {
        match self {
            Self::Packed(c) => *c,
            Self::Custom(c) => PackedColor::from_color(c),
        }
    }
}

impl<L: ColorLayout> Default for Color<L> {
    fn default() -> Self {
        Self::Packed(PackedColor::default())
    }
}

impl<L: ColorLayout> Rgba for Color<L> {
    fn channel(&self, channel: ColorChannel) -> f32 {
        match self {
            Self::Packed(c) => c.channel(channel),
            Self::Custom(c) => c.channel(channel),
        }
    }
}

impl<L: ColorLayout> fmt::Display for Color<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rgba(self, f)
    }
}

impl<L: ColorLayout, M: ColorLayout> PartialEq<Color<M>> for Color<L> {
    fn eq(&self, other: &Color<M>) -> bool {
        same_rgba(self, other)
    }
}

impl<L: ColorLayout> From<PackedColor<L>> for Color<L> {
    fn from(color: PackedColor<L>) -> Self {
        Self::Packed(color)
    }
}

impl<L: ColorLayout> From<CustomColor> for Color<L> {
    fn from(color: CustomColor) -> Self {
        Self::Custom(color)
    }
}

impl<L: ColorLayout> Serializable for Color<L> {
    fn serialize_impl(&mut self, s: &mut dyn SerializerObject) -> Result<()> {
        match self {
            Self::Packed(c) => c.serialize_impl(s),
            Self::Custom(c) => Err(SerializerError::NotSerializable(format!(
                "custom color {c} has no binary encoding"
            ))),
        }
    }

    fn state(&self) -> &ObjectState {
        match self {
            Self::Packed(c) => &c.state,
            Self::Custom(c) => &c.state,
        }
    }

    fn state_mut(&mut self) -> &mut ObjectState {
        match self {
            Self::Packed(c) => &mut c.state,
            Self::Custom(c) => &mut c.state,
        }
    }

    fn is_short_log(&self) -> bool {
        true
    }

    fn short_log(&self) -> String {
        self.to_string()
    }
}
