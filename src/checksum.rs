//! Running checksum and XOR transforms applied by a writer.
//!
//! The engine only ever feeds bytes in and asks for the result; the
//! algorithms themselves are pluggable. A few reference calculators common in
//! game formats are provided.

use std::fmt;
use std::hash::Hasher;

use twox_hash::XxHash64;

/// A stateful checksum over every byte written while it is active.
pub trait ChecksumCalculator: fmt::Debug {
    /// Feeds bytes into the checksum.
    fn add_bytes(&mut self, bytes: &[u8]);

    /// The checksum of everything fed so far.
    fn checksum(&self) -> u64;

    /// `true` to checksum the bytes before any active XOR transform is
    /// applied, `false` to checksum what actually lands in the file.
    fn calculate_for_decrypted(&self) -> bool {
        true
    }
}

/// A stateful byte-wise XOR transform.
pub trait XorCalculator: fmt::Debug {
    /// Transforms one byte.
    fn xor_byte(&mut self, byte: u8) -> u8;

    /// Transforms a buffer in place.
    fn xor_bytes(&mut self, bytes: &mut [u8]) {
        for byte in bytes {
            *byte = self.xor_byte(*byte);
        }
    }
}

/// Wrapping sum of all bytes, truncated to `bits`.
#[derive(Debug, Clone)]
pub struct ByteSumChecksum {
    sum: u64,
    mask: u64,
    on_decrypted: bool,
}

impl ByteSumChecksum {
    /// A sum truncated to `bits` (8, 16, 32 or 64).
    pub fn new(bits: u32) -> Self {
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        Self {
            sum: 0,
            mask,
            on_decrypted: true,
        }
    }

    /// Checksum the XOR-transformed bytes instead of the plain ones.
    pub fn over_encrypted(mut self) -> Self {
        self.on_decrypted = false;
        self
    }
}

impl ChecksumCalculator for ByteSumChecksum {
    fn add_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.sum = self.sum.wrapping_add(u64::from(b)) & self.mask;
        }
    }

    fn checksum(&self) -> u64 {
        self.sum
    }

    fn calculate_for_decrypted(&self) -> bool {
        self.on_decrypted
    }
}

/// 64-bit xxHash of the written bytes.
pub struct XxHash64Checksum {
    hasher: XxHash64,
}

impl XxHash64Checksum {
    /// A hasher seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            hasher: XxHash64::with_seed(seed),
        }
    }
}

impl Default for XxHash64Checksum {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl fmt::Debug for XxHash64Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XxHash64Checksum({:016X})", self.hasher.finish())
    }
}

impl ChecksumCalculator for XxHash64Checksum {
    fn add_bytes(&mut self, bytes: &[u8]) {
        self.hasher.write(bytes);
    }

    fn checksum(&self) -> u64 {
        self.hasher.finish()
    }
}

/// XOR with a single constant key byte.
#[derive(Debug, Clone, Copy)]
pub struct Xor8Calculator {
    key: u8,
}

impl Xor8Calculator {
    /// Creates the transform.
    pub fn new(key: u8) -> Self {
        Self { key }
    }
}

impl XorCalculator for Xor8Calculator {
    fn xor_byte(&mut self, byte: u8) -> u8 {
        byte ^ self.key
    }
}

/// XOR with a repeating multi-byte key. The key position carries over
/// between writes.
#[derive(Debug, Clone)]
pub struct XorKeyCalculator {
    key: Vec<u8>,
    position: usize,
}

impl XorKeyCalculator {
    /// Creates the transform. An empty key leaves bytes unchanged.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            position: 0,
        }
    }
}

impl XorCalculator for XorKeyCalculator {
    fn xor_byte(&mut self, byte: u8) -> u8 {
        let Some(&k) = self.key.get(self.position) else {
            return byte;
        };
        self.position = (self.position + 1) % self.key.len();
        byte ^ k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sum_wraps_at_width() {
        let mut c = ByteSumChecksum::new(8);
        c.add_bytes(&[0xFF, 0x02]);
        assert_eq!(c.checksum(), 0x01);

        let mut c = ByteSumChecksum::new(16);
        c.add_bytes(&[0xFF, 0x02]);
        assert_eq!(c.checksum(), 0x101);
    }

    #[test]
    fn xxhash_is_stable_across_split_writes() {
        let mut whole = XxHash64Checksum::default();
        whole.add_bytes(b"hello world");
        let mut split = XxHash64Checksum::default();
        split.add_bytes(b"hello ");
        split.add_bytes(b"world");
        assert_eq!(whole.checksum(), split.checksum());
    }

    #[test]
    fn repeating_key_cycles() {
        let mut x = XorKeyCalculator::new(vec![0x01, 0x02]);
        let mut buf = [0u8; 5];
        x.xor_bytes(&mut buf);
        assert_eq!(buf, [1, 2, 1, 2, 1]);
        assert_eq!(XorKeyCalculator::new(Vec::new()).xor_byte(7), 7);
    }
}
