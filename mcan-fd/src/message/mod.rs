//! Handling of messages/frames
//!
//! Elements are packed straight into message RAM words. Header words are
//! accessed through bit field views, the data field as little-endian words.

pub mod rx;
pub mod tx;
pub mod tx_event;

pub use rx::RxElement;
pub use tx::TxElement;
pub use tx_event::{TxEventElement, TxEventType};

use crate::error::{Error, Result};
use bitfield::bitfield;
use core::convert::TryFrom;
use embedded_can::{ExtendedId, Id, StandardId};
use vcell::VolatileCell;

/// Header words at the start of every Rx and Tx element
pub(crate) const HEADER_WORDS: usize = 2;
/// Words of one Tx event element
pub(crate) const TX_EVENT_WORDS: usize = 2;
/// Words of one standard ID filter element
pub(crate) const STANDARD_FILTER_WORDS: usize = 1;
/// Words of one extended ID filter element
pub(crate) const EXTENDED_FILTER_WORDS: usize = 2;

/// Data field size of the elements of a region
///
/// Classic frames always fit, as the smallest size holds 8 bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementSize {
    /// 8 byte data field
    #[default]
    Bytes8 = 0,
    /// 12 byte data field
    Bytes12 = 1,
    /// 16 byte data field
    Bytes16 = 2,
    /// 20 byte data field
    Bytes20 = 3,
    /// 24 byte data field
    Bytes24 = 4,
    /// 32 byte data field
    Bytes32 = 5,
    /// 48 byte data field
    Bytes48 = 6,
    /// 64 byte data field
    Bytes64 = 7,
}

impl ElementSize {
    /// Number of data bytes reserved per element
    pub const fn data_bytes(self) -> usize {
        match self {
            Self::Bytes8 => 8,
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
        }
    }

    /// Number of words per element, header included
    pub const fn element_words(self) -> usize {
        HEADER_WORDS + self.data_bytes() / 4
    }

    /// Value of the data field size register fields
    pub(crate) const fn bits(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ElementSize {
    type Error = Error;

    /// Decodes the data field size register field
    fn try_from(bits: u8) -> Result<Self> {
        Ok(match bits {
            0 => Self::Bytes8,
            1 => Self::Bytes12,
            2 => Self::Bytes16,
            3 => Self::Bytes20,
            4 => Self::Bytes24,
            5 => Self::Bytes32,
            6 => Self::Bytes48,
            7 => Self::Bytes64,
            _ => return Err(Error::ElementSizeInvalid),
        })
    }
}

/// Data length code of a payload of exactly `len` bytes
///
/// Lengths between the FD sizes have no code; they are an error rather than
/// rounded up.
pub fn len_to_dlc(len: usize) -> Result<u8> {
    Ok(match len {
        0..=8 => len as u8,
        12 => 9,
        16 => 10,
        20 => 11,
        24 => 12,
        32 => 13,
        48 => 14,
        64 => 15,
        _ => return Err(Error::ElementSizeInvalid),
    })
}

/// Converts data length code to a length in bytes
///
/// Classic frames carry at most 8 bytes whatever the code says.
pub fn dlc_to_len(dlc: u8, fd_format: bool) -> usize {
    if fd_format {
        match dlc {
            0..=8 => dlc.into(),
            9 => 12,
            10 => 16,
            11 => 20,
            12 => 24,
            13 => 32,
            14 => 48,
            15.. => 64,
        }
    } else {
        match dlc {
            0..=8 => dlc.into(),
            9.. => 8,
        }
    }
}

/// Kind of the frame
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameType {
    /// Frame carrying a payload
    #[default]
    Data,
    /// Request for the identified frame; carries no payload
    Remote,
}

bitfield! {
    /// First header word, common to Rx, Tx and Tx event elements
    #[derive(Copy, Clone, Default)]
    (pub(crate)) struct IdHeader(u32);
    impl Debug;
    /// Identifier, standard ones in the upper 11 bits
    pub u32, raw_id, set_raw_id: 28, 0;
    /// Remote Transmission Request
    pub rtr, set_rtr: 29;
    /// Extended Identifier
    pub xtd, set_xtd: 30;
    /// Error State Indicator
    pub esi, set_esi: 31;
}

impl IdHeader {
    pub(crate) fn can_id(&self) -> Id {
        if self.xtd() {
            // The field is 29 bits wide
            Id::Extended(unsafe { ExtendedId::new_unchecked(self.raw_id()) })
        } else {
            // The upper 11 of 29 bits
            Id::Standard(unsafe { StandardId::new_unchecked((self.raw_id() >> 18) as u16) })
        }
    }

    pub(crate) fn set_can_id(&mut self, id: Id) {
        match id {
            Id::Standard(id) => {
                self.set_xtd(false);
                self.set_raw_id(u32::from(id.as_raw()) << 18);
            }
            Id::Extended(id) => {
                self.set_xtd(true);
                self.set_raw_id(id.as_raw());
            }
        }
    }

    pub(crate) fn frame_type(&self) -> FrameType {
        if self.rtr() {
            FrameType::Remote
        } else {
            FrameType::Data
        }
    }
}

bitfield! {
    /// Second header word of a Tx element
    #[derive(Copy, Clone, Default)]
    (pub(crate)) struct TxHeader(u32);
    impl Debug;
    /// Data Length Code
    pub u8, dlc, set_dlc: 19, 16;
    /// Bit Rate Switch
    pub brs, set_brs: 20;
    /// FD Format
    pub fdf, set_fdf: 21;
    /// Event FIFO Control
    pub efc, set_efc: 23;
    /// Message Marker
    pub u8, mm, set_mm: 31, 24;
}

bitfield! {
    /// Second header word of an Rx element
    #[derive(Copy, Clone, Default)]
    (pub(crate)) struct RxHeader(u32);
    impl Debug;
    /// Rx Timestamp
    pub u16, rxts, set_rxts: 15, 0;
    /// Data Length Code
    pub u8, dlc, set_dlc: 19, 16;
    /// Bit Rate Switch
    pub brs, set_brs: 20;
    /// FD Format
    pub fdf, set_fdf: 21;
    /// Filter Index
    pub u8, fidx, set_fidx: 30, 24;
    /// Accepted Non-matching Frame
    pub anmf, set_anmf: 31;
}

bitfield! {
    /// Second word of a Tx event element
    #[derive(Copy, Clone, Default)]
    (pub(crate)) struct TxEventHeader(u32);
    impl Debug;
    /// Tx Timestamp
    pub u16, txts, set_txts: 15, 0;
    /// Data Length Code
    pub u8, dlc, set_dlc: 19, 16;
    /// Bit Rate Switch
    pub brs, set_brs: 20;
    /// FD Format
    pub fdf, set_fdf: 21;
    /// Event Type
    pub u8, et, set_et: 23, 22;
    /// Message Marker
    pub u8, mm, set_mm: 31, 24;
}

/// Writes `data` to the data words of an element, zero-padding the last word
pub(crate) fn write_data(words: &[VolatileCell<u32>], data: &[u8]) {
    for (word, chunk) in words.iter().zip(data.chunks(4)) {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        word.set(u32::from_le_bytes(bytes));
    }
}

/// Fills `data` from the data words of an element
pub(crate) fn read_data(words: &[VolatileCell<u32>], data: &mut [u8]) {
    for (word, chunk) in words.iter().zip(data.chunks_mut(4)) {
        let bytes = word.get().to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FD_LENGTHS: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

    #[cfg(feature = "defmt")]
    #[test]
    fn elements_can_be_logged() {
        fn format<T: defmt::Format>() {}
        format::<TxElement<'static>>();
        format::<RxElement>();
        format::<TxEventElement>();
        format::<crate::filter::Filter>();
        format::<crate::filter::ExtFilter>();
    }

    #[test]
    fn fd_lengths_survive_dlc() {
        for (code, len) in FD_LENGTHS.into_iter().enumerate() {
            assert_eq!(len_to_dlc(len), Ok(code as u8));
            assert_eq!(dlc_to_len(code as u8, true), len);
        }
    }

    #[test]
    fn classic_dlc_is_capped_at_8() {
        for dlc in 9..=15 {
            assert_eq!(dlc_to_len(dlc, false), 8);
        }
    }

    #[test]
    fn lengths_without_code_are_rejected() {
        for len in [9, 13, 33, 63, 65, 1000] {
            assert_eq!(len_to_dlc(len), Err(Error::ElementSizeInvalid));
        }
    }

    #[test]
    fn element_size_strides() {
        assert_eq!(ElementSize::Bytes8.element_words(), 4);
        assert_eq!(ElementSize::Bytes12.element_words(), 5);
        assert_eq!(ElementSize::Bytes64.element_words(), 18);
        assert_eq!(ElementSize::try_from(6), Ok(ElementSize::Bytes48));
        assert_eq!(ElementSize::try_from(8), Err(Error::ElementSizeInvalid));
    }

    #[test]
    fn standard_id_lives_in_upper_bits() {
        let mut header = IdHeader(0);
        header.set_can_id(StandardId::new(0x123).unwrap().into());
        assert_eq!(header.0, 0x123 << 18);
        assert_eq!(header.can_id(), Id::Standard(StandardId::new(0x123).unwrap()));

        header.set_can_id(ExtendedId::new(0x1abc_def0).unwrap().into());
        assert_eq!(header.0, 1 << 30 | 0x1abc_def0);
        assert_eq!(header.can_id(), Id::Extended(ExtendedId::new(0x1abc_def0).unwrap()));
    }

    #[test]
    fn data_words_are_little_endian() {
        let words: [VolatileCell<u32>; 2] = core::array::from_fn(|_| VolatileCell::new(0));
        write_data(&words, &[1, 2, 3, 4, 5]);
        assert_eq!(words[0].get(), 0x0403_0201);
        assert_eq!(words[1].get(), 0x0000_0005);
        let mut data = [0; 6];
        read_data(&words, &mut data);
        assert_eq!(data, [1, 2, 3, 4, 5, 0]);
    }
}
