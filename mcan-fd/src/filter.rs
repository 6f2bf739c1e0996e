//! Message filters
//!
//! Filters are written into the list regions of message RAM while the
//! controller runs; the lists themselves are placed by the configuration.

use crate::bus::Mcan;
use crate::error::{Error, Result};
use crate::layout::Region;
use bitfield::bitfield;
use embedded_can::{ExtendedId, StandardId};
use mcan_fd_core::{CanId, Dependencies};

/// Message filter field for 11-bit RX messages
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Filter {
    /// The filter is skipped
    Disabled,
    /// Range filter from low to high IDs
    Range {
        /// Action to take on a matched element
        action: Action,
        /// Lower filter limit
        low: StandardId,
        /// Upper filter limit
        high: StandardId,
    },
    /// Filter for two IDs
    Dual {
        /// Action to take on a matched element
        action: Action,
        /// Individual filter 1
        id1: StandardId,
        /// Individual filter 2
        id2: StandardId,
    },
    /// Traditional filter/mask CAN filter
    Classic {
        /// Action to take on a matched element
        action: Action,
        /// ID filter
        filter: StandardId,
        /// ID mask
        mask: StandardId,
    },
    /// Store into RX buffer or as debug message (ignores filter type)
    StoreBuffer {
        /// 11-bit filter ID 1
        id: StandardId,
        /// Special message type for StoreRxBuffer
        msg_type: SbMsgType,
        /// Rx buffer index; 0..=63
        offset: u8,
    },
}

/// Store buffer message types
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SbMsgType {
    /// Store into the Rx buffer pointed to by the offset
    #[default]
    RxBuffer = 0,
    /// Debug message A
    DebugA,
    /// Debug message B
    DebugB,
    /// Debug message C
    DebugC,
}

/// Message filter field for 29-bit RX messages
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtFilter {
    /// The filter is skipped
    Disabled,
    /// Range filter from low to high IDs with XIDAM
    MaskedRange {
        /// Action to take on a matched element
        action: Action,
        /// Lower filter limit
        low: ExtendedId,
        /// Upper filter limit
        high: ExtendedId,
    },
    /// Filter for two IDs
    Dual {
        /// Action to take on a matched element
        action: Action,
        /// Individual filter 1
        id1: ExtendedId,
        /// Individual filter 2
        id2: ExtendedId,
    },
    /// Traditional filter/mask CAN filter
    Classic {
        /// Action to take on a matched element
        action: Action,
        /// ID filter
        filter: ExtendedId,
        /// ID mask
        mask: ExtendedId,
    },
    /// Range filter from low to high IDs without XIDAM
    Range {
        /// Action to take on a matched element
        action: Action,
        /// Lower filter limit
        low: ExtendedId,
        /// Upper filter limit
        high: ExtendedId,
    },
    /// Store into RX buffer or as debug message (ignores filter type)
    StoreBuffer {
        /// 29-bit filter ID 1
        id: ExtendedId,
        /// Special message type for StoreRxBuffer
        msg_type: SbMsgType,
        /// Rx buffer index; 0..=63
        offset: u8,
    },
}

/// Filter element configurations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Store in RX FIFO 0 if filter matches
    StoreFifo0,
    /// Store in RX FIFO 1 if filter matches
    StoreFifo1,
    /// Reject ID if filter matches
    Reject,
    /// Set priority if filter matches
    Priority,
    /// Set priority and store in FIFO 0 if filter matches
    PriorityFifo0,
    /// Set priority and store in FIFO 1 if filter matches
    PriorityFifo1,
}

impl From<Action> for u8 {
    fn from(val: Action) -> Self {
        match val {
            Action::StoreFifo0 => 0x1,
            Action::StoreFifo1 => 0x2,
            Action::Reject => 0x3,
            Action::Priority => 0x4,
            Action::PriorityFifo0 => 0x5,
            Action::PriorityFifo1 => 0x6,
        }
    }
}

/// Element configuration value selecting the store buffer variant
const STORE_BUFFER: u8 = 0x7;

bitfield! {
    /// Standard message ID filter element
    #[derive(Copy, Clone, Default)]
    struct StandardElement(u32);
    impl Debug;
    /// Standard Filter ID 2
    u16, _, set_sfid2: 10, 0;
    /// Standard Filter ID 1
    u16, _, set_sfid1: 26, 16;
    /// Standard Filter Element Configuration
    u8, _, set_sfec: 29, 27;
    /// Standard Filter Type
    u8, _, set_sft: 31, 30;
}

bitfield! {
    /// First word of an extended message ID filter element
    #[derive(Copy, Clone, Default)]
    struct ExtendedElement0(u32);
    impl Debug;
    /// Extended Filter ID 1
    u32, _, set_efid1: 28, 0;
    /// Extended Filter Element Configuration
    u8, _, set_efec: 31, 29;
}

bitfield! {
    /// Second word of an extended message ID filter element
    #[derive(Copy, Clone, Default)]
    struct ExtendedElement1(u32);
    impl Debug;
    /// Extended Filter ID 2
    u32, _, set_efid2: 28, 0;
    /// Extended Filter Type
    u8, _, set_eft: 31, 30;
}

/// Second ID operand of the store buffer variants
fn store_buffer_operand(msg_type: SbMsgType, offset: u8) -> u32 {
    (msg_type as u32) << 9 | u32::from(offset & 0x3f)
}

impl From<Filter> for StandardElement {
    fn from(val: Filter) -> Self {
        let (sft, sfec, id1, id2) = match val {
            Filter::Disabled => return StandardElement(0),
            Filter::Range { action, low, high } => (0, action.into(), low, high.as_raw()),
            Filter::Dual { action, id1, id2 } => (1, action.into(), id1, id2.as_raw()),
            Filter::Classic {
                action,
                filter,
                mask,
            } => (2, action.into(), filter, mask.as_raw()),
            Filter::StoreBuffer {
                id,
                msg_type,
                offset,
            } => (
                0,
                STORE_BUFFER,
                id,
                store_buffer_operand(msg_type, offset) as u16,
            ),
        };
        let mut e = StandardElement(0);
        e.set_sft(sft);
        e.set_sfec(sfec);
        e.set_sfid1(id1.as_raw());
        e.set_sfid2(id2);
        e
    }
}

/// Both words of an extended message ID filter element
fn extended_element(val: ExtFilter) -> (ExtendedElement0, ExtendedElement1) {
    let (eft, efec, id1, id2) = match val {
        ExtFilter::Disabled => return (ExtendedElement0(0), ExtendedElement1(0)),
        ExtFilter::MaskedRange { action, low, high } => (0, action.into(), low, high.as_raw()),
        ExtFilter::Dual { action, id1, id2 } => (1, action.into(), id1, id2.as_raw()),
        ExtFilter::Classic {
            action,
            filter,
            mask,
        } => (2, action.into(), filter, mask.as_raw()),
        ExtFilter::Range { action, low, high } => (3, action.into(), low, high.as_raw()),
        ExtFilter::StoreBuffer {
            id,
            msg_type,
            offset,
        } => (0, STORE_BUFFER, id, store_buffer_operand(msg_type, offset)),
    };
    let mut f0 = ExtendedElement0(0);
    f0.set_efec(efec);
    f0.set_efid1(id1.as_raw());
    let mut f1 = ExtendedElement1(0);
    f1.set_eft(eft);
    f1.set_efid2(id2);
    (f0, f1)
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    /// Overwrites the standard ID filter at `index` of the configured list
    pub fn set_standard_id_filter(&mut self, filter: Filter, index: u8) -> Result<()> {
        let words = self
            .layout()
            .standard_filters
            .ok_or(Error::IndexOutOfRange)
            .and_then(|region: Region| region.element(self.memory(), index))?;
        words[0].set(StandardElement::from(filter).0);
        Ok(())
    }

    /// Overwrites the extended ID filter at `index` of the configured list
    pub fn set_extended_id_filter(&mut self, filter: ExtFilter, index: u8) -> Result<()> {
        let words = self
            .layout()
            .extended_filters
            .ok_or(Error::IndexOutOfRange)
            .and_then(|region: Region| region.element(self.memory(), index))?;
        let (f0, f1) = extended_element(filter);
        // The filter is matched as a whole only once F0 enables it again
        words[0].set(0);
        words[1].set(f1.0);
        words[0].set(f0.0);
        Ok(())
    }
}
