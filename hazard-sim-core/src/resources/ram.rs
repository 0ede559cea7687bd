use crate::bus::Bus;
use crate::{unit, AddressRange, Alignment};

/// Word-based RAM implementation.
///
/// Contents are stored as little-endian words. Byte and halfword writes are performed as a masked
/// read-modify-write of the containing word. Halfword and word accesses must be naturally aligned,
/// misaligned accesses fail like out-of-bounds ones.
///
/// This can be categorized as *main memory* according to the types of memory resources defined by
/// the RISC-V spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    words: Vec<u32>,
    /// Size in bytes, a multiple of 4.
    size: u32,
}

impl Ram {
    /// Create a new zero-initialized RAM resource that can hold `size` bytes.
    ///
    /// Returns `None` if `size` is zero or not a multiple of the word size.
    pub fn new(size: u32) -> Option<Self> {
        if size == 0 || !Alignment::WORD.is_aligned(size) {
            None
        } else {
            Some(Self {
                words: vec![0; (size / unit::WORD) as usize],
                size,
            })
        }
    }

    /// Returns the size expressed in bytes. Guaranteed to be at least four.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u32 {
        self.size
    }

    /// Returns the range of byte offsets covered by this RAM unit, starting at `0`.
    pub fn range(&self) -> AddressRange {
        crate::address_range![0, self.size - 1]
    }

    /// Copy `image` into RAM starting at byte offset `0`.
    ///
    /// Returns `false` without modifying anything if `image` does not fit.
    pub fn load(&mut self, image: &[u8]) -> bool {
        if image.len() > self.size as usize {
            return false;
        }
        for (word, chunk) in self.words.iter_mut().zip(image.chunks(4)) {
            let mut bytes = word.to_le_bytes();
            bytes[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(bytes);
        }
        true
    }

    /// Returns the index of the word containing `address`, if the access of `size` bytes is
    /// naturally aligned and in bounds.
    fn word_index(&self, address: u32, size: u32) -> Option<usize> {
        let aligned = Alignment::natural_for_size(size)?.is_aligned(address);
        (aligned && self.range().contains_access(address, size))
            .then_some((address / unit::WORD) as usize)
    }

    /// Replace the bits selected by `mask` (before shifting) in the word containing `address`.
    fn modify(&mut self, address: u32, size: u32, mask: u32, value: u32) -> bool {
        let Some(index) = self.word_index(address, size) else {
            return false;
        };
        let shift = 8 * (address % unit::WORD);
        let word = &mut self.words[index];
        *word = *word & !(mask << shift) | (value & mask) << shift;
        true
    }
}

impl Bus for Ram {
    fn read_byte(&mut self, address: u32) -> Option<u8> {
        let index = self.word_index(address, unit::BYTE)?;
        Some((self.words[index] >> (8 * (address % unit::WORD))) as u8)
    }

    fn read_halfword(&mut self, address: u32) -> Option<u16> {
        let index = self.word_index(address, unit::HALFWORD)?;
        Some((self.words[index] >> (8 * (address % unit::WORD))) as u16)
    }

    fn read_word(&mut self, address: u32) -> Option<u32> {
        let index = self.word_index(address, unit::WORD)?;
        Some(self.words[index])
    }

    fn write_byte(&mut self, address: u32, value: u8) -> bool {
        self.modify(address, unit::BYTE, 0xff, value as u32)
    }

    fn write_halfword(&mut self, address: u32, value: u16) -> bool {
        self.modify(address, unit::HALFWORD, 0xffff, value as u32)
    }

    fn write_word(&mut self, address: u32, value: u32) -> bool {
        self.modify(address, unit::WORD, u32::MAX, value)
    }
}
