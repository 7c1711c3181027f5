//! Bit-field extraction and insertion over fixed-width unsigned integers.
//!
//! These are pure functions. The field `(width, offset)` must fit inside the
//! backing integer; anything else is a bug in the calling structure and trips
//! an assertion.

/// An unsigned integer that can back a bit field.
pub trait BitInt: Copy + Default + PartialEq + std::fmt::Debug {
    /// Number of bits in the backing integer.
    const BITS: u32;

    /// Widens the value to 64 bits.
    fn to_u64(self) -> u64;

    /// Truncates a 64-bit value to this width.
    fn from_u64(value: u64) -> Self;
}

macro_rules! impl_bit_int {
    ($($t:ty),*) => {
        $(
            impl BitInt for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn to_u64(self) -> u64 {
                    u64::from(self)
                }

                #[inline]
                #[allow(clippy::cast_possible_truncation)]
                fn from_u64(value: u64) -> Self {
                    value as $t
                }
            }
        )*
    }
}

impl_bit_int!(u8, u16, u32, u64);

#[inline]
fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
fn check_field<T: BitInt>(width: u32, offset: u32) {
    assert!(
        width >= 1 && offset + width <= T::BITS,
        "bit field (width {width}, offset {offset}) does not fit in {} bits",
        T::BITS
    );
}

/// Returns the `width` bits of `source` starting at bit `offset` (bit 0 is the
/// least significant bit).
///
/// # Panics
///
/// Panics if `width` is zero or `offset + width` exceeds `T::BITS`.
pub fn extract_bits<T: BitInt>(source: T, width: u32, offset: u32) -> T {
    check_field::<T>(width, offset);
    T::from_u64((source.to_u64() >> offset) & mask(width))
}

/// Returns `source` with the `width` bits at `offset` replaced by the low
/// `width` bits of `value`. Higher bits of `value` are discarded.
///
/// # Panics
///
/// Panics if `width` is zero or `offset + width` exceeds `T::BITS`.
pub fn set_bits<T: BitInt>(source: T, value: T, width: u32, offset: u32) -> T {
    check_field::<T>(width, offset);
    let field = mask(width) << offset;
    let cleared = source.to_u64() & !field;
    T::from_u64(cleared | ((value.to_u64() << offset) & field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_middle_field() {
        assert_eq!(extract_bits(0b1011_0110u8, 3, 2), 0b101);
        assert_eq!(extract_bits(0x801Fu16, 5, 10), 0);
        assert_eq!(extract_bits(0x801Fu16, 1, 15), 1);
    }

    #[test]
    fn set_preserves_neighbouring_bits() {
        let v = set_bits(0xFFFF_FFFFu32, 0, 8, 8);
        assert_eq!(v, 0xFFFF_00FF);
        let v = set_bits(0u32, 0x1FF, 8, 0);
        assert_eq!(v, 0xFF, "value is masked to the field width");
    }

    #[test]
    fn full_width_fields() {
        assert_eq!(extract_bits(u32::MAX, 32, 0), u32::MAX);
        assert_eq!(set_bits(0u64, u64::MAX, 64, 0), u64::MAX);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn overflowing_field_is_a_bug() {
        let _ = extract_bits(0u16, 8, 9);
    }

    proptest! {
        #[test]
        fn set_then_extract_round_trips(offset in 0u32..32, width in 1u32..=32, raw in any::<u32>()) {
            prop_assume!(offset + width <= 32);
            let value = raw & (mask(width) as u32);
            let packed = set_bits(0u32, value, width, offset);
            prop_assert_eq!(extract_bits(packed, width, offset), value);
        }
    }
}
