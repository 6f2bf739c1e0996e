//! Memory management for the RAM interface between core and peripheral.
use core::mem::MaybeUninit;
use vcell::VolatileCell;

/// Size of the window the controller can address with its 16-bit offsets
pub const WINDOW_SIZE: usize = 1 << 16;

/// Memory shared between the peripheral and core, `WORDS` 32-bit words long.
///
/// Regions are placed inside it at runtime through the word offsets of
/// [`Config`](crate::config::Config).
#[repr(C, align(4))]
pub struct SharedMemory<const WORDS: usize>(MaybeUninit<[VolatileCell<u32>; WORDS]>);

impl<const WORDS: usize> SharedMemory<WORDS> {
    /// All initialization is handled by the type that uses the memory, so this
    /// type can safely be assigned to a link_section that is not
    /// initialized by the system to control its position in memory.
    pub const fn new() -> Self {
        Self(MaybeUninit::uninit())
    }

    pub(crate) fn init(&mut self) -> &mut [VolatileCell<u32>] {
        self.0 = MaybeUninit::zeroed();
        // Safety: All bits 0 is a valid value for the contained array.
        unsafe { self.0.assume_init_mut() }
    }

    /// The peripheral uses 16-bit addressing for its memory configuration.
    /// The upper half of the address is shared by the whole block, so it has
    /// to lie within a single 64K window.
    pub fn is_addressable(&self) -> bool {
        let start = self as *const _ as usize;
        let len = core::mem::size_of::<Self>();
        match len {
            0 => true,
            1..=WINDOW_SIZE => start / WINDOW_SIZE == (start + len - 1) / WINDOW_SIZE,
            _ => false,
        }
    }
}

impl<const WORDS: usize> Default for SharedMemory<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// 16-bit address the controller uses for `word` words into `memory`
pub(crate) fn hw_address(memory: &[VolatileCell<u32>], word: u16) -> u16 {
    (memory.as_ptr() as usize + usize::from(word) * 4) as u16
}

/// Word offset into `memory` of the 16-bit controller address `address`
pub(crate) fn word_offset(memory: &[VolatileCell<u32>], address: u16) -> u16 {
    address.wrapping_sub(memory.as_ptr() as usize as u16) / 4
}

#[cfg(test)]
mod test {
    use super::*;

    #[repr(C, align(256))]
    struct Aligned(SharedMemory<16>);

    #[test]
    fn addressable_within_window() {
        let memory = Aligned(SharedMemory::new());
        assert!(memory.0.is_addressable());
    }

    #[test]
    fn addresses_convert_both_ways() {
        let mut memory = Aligned(SharedMemory::new());
        let words = memory.0.init();
        let base = words.as_ptr() as usize as u16;
        assert_eq!(hw_address(words, 3), base.wrapping_add(12));
        assert_eq!(word_offset(words, hw_address(words, 11)), 11);
    }

    #[test]
    fn init_zeroes_memory() {
        let mut memory = Aligned(SharedMemory::new());
        let words = memory.0.init();
        words[5].set(0xdead_beef);
        let words = memory.0.init();
        assert!(words.iter().all(|w| w.get() == 0));
    }
}
