//! Interrupt configuration and flag reporting
//!
//! Bits 20 and 21 of the interrupt registers are reserved. They are never
//! part of an [`InterruptSet`] the driver writes and are preserved when the
//! enable and line select registers are updated.

use crate::bus::Mcan;
use crate::reg::Access as _;
use bitfield::bitfield;
use core::convert::TryFrom;
use mcan_fd_core::{CanId, Dependencies};

/// Reserved bits of IR, IE and ILS
pub(crate) const RESERVED: u32 = 0x0030_0000;
/// Every interrupt flag the controller defines
pub(crate) const ALL: u32 = 0x3fff_ffff & !RESERVED;

/// CAN interrupt lines
/// The CAN peripheral provides two interrupt lines to the system interrupt
/// controller. Which interrupts trigger which interrupt line is configurable
/// via [`InterruptConfig`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptLine {
    /// CAN0-line
    Line0,
    /// CAN1-line
    Line1,
}

bitfield! {
    /// A set of CAN interrupts.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct InterruptSet(u32);

    /// Access to Reserved Address
    pub ara, set_ara:  29;
    /// Protocol Error in Data phase
    pub ped, set_ped:  28;
    /// Protocol Error in Arbitration phase
    pub pea, set_pea:  27;
    /// Watchdog
    pub wdi, set_wdi:  26;
    /// Bus Off
    pub bo, set_bo:   25;
    /// Warning status changed
    pub ew, set_ew:   24;
    /// Error Passive
    pub ep, set_ep:   23;
    /// Error Logging Overflow
    pub elo, set_elo:  22;
    /// Message stored to Dedicated Rx Buffer
    pub drx, set_drx:  19;
    /// Timeout Occured
    pub too, set_too:  18;
    /// Message Ram Access Failure
    pub mraf, set_mraf: 17;
    /// Timestamp Wraparound
    pub tsw, set_tsw:  16;
    /// Tx Event Fifo Element Lost
    pub tefl, set_tefl: 15;
    /// Tx Event Fifo Full
    pub teff, set_teff: 14;
    /// Tx Event Fifo Watermark Reached
    pub tefw, set_tefw: 13;
    /// Tx Event Fifo New Entry
    pub tefn, set_tefn: 12;
    /// Tx Fifo Empty
    pub tfe, set_tfe:  11;
    /// Transmission Cancellation Finished
    pub tcf, set_tcf:  10;
    /// Transmission Completed
    /// Note that there is a sub-interrupt for each transmit buffer element.
    /// It is enabled per frame through [`TxElement::interrupt_enabled`].
    ///
    /// [`TxElement::interrupt_enabled`]: crate::message::TxElement::interrupt_enabled
    pub tc, set_tc:   9;
    /// High Priority Message
    pub hpm, set_hpm:  8;
    /// Rx Fifo1 Message Lost
    pub rf1l, set_rf1l: 7;
    /// Rx Fifo1 Full
    pub rf1f, set_rf1f: 6;
    /// Rx Fifo1 Watermark Reached
    pub rf1w, set_rf1w: 5;
    /// Rx Fifo1 New Message
    pub rf1n, set_rf1n: 4;
    /// Rx Fifo0 Message Lost
    pub rf0l, set_rf0l: 3;
    /// Rx Fifo0 Full
    pub rf0f, set_rf0f: 2;
    /// Rx Fifo0 Watermark Reached
    pub rf0w, set_rf0w: 1;
    /// Rx Fifo0 New Message
    pub rf0n, set_rf0n: 0;
}

impl InterruptSet {
    /// Every interrupt the controller defines
    pub const fn all() -> Self {
        Self(ALL)
    }

    /// Raw bits with the reserved ones cleared
    pub const fn bits(&self) -> u32 {
        self.0 & !RESERVED
    }

    /// An iterator visiting all elements in ascending bit order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

impl FromIterator<Interrupt> for InterruptSet {
    fn from_iter<T: IntoIterator<Item = Interrupt>>(iter: T) -> Self {
        let mut set = 0_u32;
        for int in iter.into_iter() {
            set |= u32::from(int);
        }
        InterruptSet(set)
    }
}

impl core::fmt::Debug for InterruptSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InterruptSet {{ ")?;
        for int in self.iter() {
            write!(f, "{} ", int.mnemonic())?;
        }
        write!(f, "}}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for InterruptSet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "InterruptSet({=u32:#x})", self.bits())
    }
}

/// A single interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// RF0N
    RxFifo0NewMessage = 0,
    /// RF0W
    RxFifo0WatermarkReached = 1,
    /// RF0F
    RxFifo0Full = 2,
    /// RF0L
    RxFifo0MessageLost = 3,
    /// RF1N
    RxFifo1NewMessage = 4,
    /// RF1W
    RxFifo1WatermarkReached = 5,
    /// RF1F
    RxFifo1Full = 6,
    /// RF1L
    RxFifo1MessageLost = 7,
    /// HPM
    HighPriorityMessage = 8,
    /// TC
    TransmissionCompleted = 9,
    /// TCF
    TransmissionCancellationFinished = 10,
    /// TFE
    TxFifoEmpty = 11,
    /// TEFN
    TxEventFifoNewEntry = 12,
    /// TEFW
    TxEventFifoWatermarkReached = 13,
    /// TEFF
    TxEventFifoFull = 14,
    /// TEFL
    TxEventFifoElementLost = 15,
    /// TSW
    TimestampWraparound = 16,
    /// MRAF
    MessageRamAccessFailure = 17,
    /// TOO
    TimeoutOccured = 18,
    /// DRX
    MessageStoredToDedicatedRxBuffer = 19,
    /// ELO
    ErrorLoggingOverflow = 22,
    /// EP
    ErrorPassive = 23,
    /// EW
    WarningStatusChanged = 24,
    /// BO
    BusOff = 25,
    /// WDI
    Watchdog = 26,
    /// PEA
    ProtocolErrorArbitration = 27,
    /// PED
    ProtocolErrorData = 28,
    /// ARA
    AccessToReservedAddress = 29,
}

impl Interrupt {
    fn mnemonic(self) -> &'static str {
        use Interrupt::*;
        match self {
            RxFifo0NewMessage => "RF0N",
            RxFifo0WatermarkReached => "RF0W",
            RxFifo0Full => "RF0F",
            RxFifo0MessageLost => "RF0L",
            RxFifo1NewMessage => "RF1N",
            RxFifo1WatermarkReached => "RF1W",
            RxFifo1Full => "RF1F",
            RxFifo1MessageLost => "RF1L",
            HighPriorityMessage => "HPM",
            TransmissionCompleted => "TC",
            TransmissionCancellationFinished => "TCF",
            TxFifoEmpty => "TFE",
            TxEventFifoNewEntry => "TEFN",
            TxEventFifoWatermarkReached => "TEFW",
            TxEventFifoFull => "TEFF",
            TxEventFifoElementLost => "TEFL",
            TimestampWraparound => "TSW",
            MessageRamAccessFailure => "MRAF",
            TimeoutOccured => "TOO",
            MessageStoredToDedicatedRxBuffer => "DRX",
            ErrorLoggingOverflow => "ELO",
            ErrorPassive => "EP",
            WarningStatusChanged => "EW",
            BusOff => "BO",
            Watchdog => "WDI",
            ProtocolErrorArbitration => "PEA",
            ProtocolErrorData => "PED",
            AccessToReservedAddress => "ARA",
        }
    }
}

impl From<Interrupt> for u32 {
    fn from(x: Interrupt) -> Self {
        1 << x as u32
    }
}

/// Bit number of a reserved or undefined interrupt flag
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidInterruptNumber;

impl TryFrom<u8> for Interrupt {
    type Error = InvalidInterruptNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Interrupt::*;
        let ret = match value {
            0 => RxFifo0NewMessage,
            1 => RxFifo0WatermarkReached,
            2 => RxFifo0Full,
            3 => RxFifo0MessageLost,
            4 => RxFifo1NewMessage,
            5 => RxFifo1WatermarkReached,
            6 => RxFifo1Full,
            7 => RxFifo1MessageLost,
            8 => HighPriorityMessage,
            9 => TransmissionCompleted,
            10 => TransmissionCancellationFinished,
            11 => TxFifoEmpty,
            12 => TxEventFifoNewEntry,
            13 => TxEventFifoWatermarkReached,
            14 => TxEventFifoFull,
            15 => TxEventFifoElementLost,
            16 => TimestampWraparound,
            17 => MessageRamAccessFailure,
            18 => TimeoutOccured,
            19 => MessageStoredToDedicatedRxBuffer,
            22 => ErrorLoggingOverflow,
            23 => ErrorPassive,
            24 => WarningStatusChanged,
            25 => BusOff,
            26 => Watchdog,
            27 => ProtocolErrorArbitration,
            28 => ProtocolErrorData,
            29 => AccessToReservedAddress,
            _ => Err(InvalidInterruptNumber)?,
        };
        Ok(ret)
    }
}

/// An iterator over the items of an [`InterruptSet`].
///
/// This `struct` is created by [`InterruptSet::iter`].
pub struct Iter {
    flags: InterruptSet,
    index: u8,
}

impl Iterator for Iter {
    type Item = Interrupt;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < 30 {
            let i = self.index;
            self.index += 1;
            if self.flags.0 & (1 << i) == 0 {
                continue;
            }
            // Reserved bits have no interrupt and are skipped
            if let Ok(int) = Interrupt::try_from(i) {
                return Some(int);
            }
        }
        None
    }
}

/// Interrupt enabling and line routing applied by
/// [`Mcan::set_config`](crate::bus::Mcan::set_config)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    /// Interrupts that may reach an interrupt line
    pub enabled: InterruptSet,
    /// Interrupts routed to [`InterruptLine::Line1`]; all others use
    /// [`InterruptLine::Line0`]
    pub line_1: InterruptSet,
    /// Enable the CAN0-line
    pub line_0_enabled: bool,
    /// Enable the CAN1-line
    pub line_1_enabled: bool,
}

impl InterruptConfig {
    /// Enables `interrupts` on `line`, enabling the line as well
    pub fn enable(&mut self, interrupts: InterruptSet, line: InterruptLine) {
        self.enabled.0 |= interrupts.bits();
        match line {
            InterruptLine::Line0 => {
                self.line_1.0 &= !interrupts.bits();
                self.line_0_enabled = true;
            }
            InterruptLine::Line1 => {
                self.line_1.0 |= interrupts.bits();
                self.line_1_enabled = true;
            }
        }
    }
}

/// Snapshot of the interrupt flags, see [`Mcan::get_interrupt_status`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct InterruptStatus {
    pub rx_fifo_0_new_message: bool,
    pub rx_fifo_0_watermark_reached: bool,
    pub rx_fifo_0_full: bool,
    pub rx_fifo_0_message_lost: bool,
    pub rx_fifo_1_new_message: bool,
    pub rx_fifo_1_watermark_reached: bool,
    pub rx_fifo_1_full: bool,
    pub rx_fifo_1_message_lost: bool,
    pub high_priority_message: bool,
    pub transmission_completed: bool,
    pub transmission_cancellation_finished: bool,
    pub tx_fifo_empty: bool,
    pub tx_event_fifo_new_entry: bool,
    pub tx_event_fifo_watermark_reached: bool,
    pub tx_event_fifo_full: bool,
    pub tx_event_fifo_element_lost: bool,
    pub timestamp_wraparound: bool,
    pub message_ram_access_failure: bool,
    pub timeout_occurred: bool,
    pub message_stored_to_dedicated_rx_buffer: bool,
    pub error_logging_overflow: bool,
    pub error_passive: bool,
    pub warning_status_changed: bool,
    pub bus_off: bool,
    pub watchdog: bool,
    pub protocol_error_arbitration: bool,
    pub protocol_error_data: bool,
    pub access_to_reserved_address: bool,
}

impl From<InterruptSet> for InterruptStatus {
    fn from(set: InterruptSet) -> Self {
        Self {
            rx_fifo_0_new_message: set.rf0n(),
            rx_fifo_0_watermark_reached: set.rf0w(),
            rx_fifo_0_full: set.rf0f(),
            rx_fifo_0_message_lost: set.rf0l(),
            rx_fifo_1_new_message: set.rf1n(),
            rx_fifo_1_watermark_reached: set.rf1w(),
            rx_fifo_1_full: set.rf1f(),
            rx_fifo_1_message_lost: set.rf1l(),
            high_priority_message: set.hpm(),
            transmission_completed: set.tc(),
            transmission_cancellation_finished: set.tcf(),
            tx_fifo_empty: set.tfe(),
            tx_event_fifo_new_entry: set.tefn(),
            tx_event_fifo_watermark_reached: set.tefw(),
            tx_event_fifo_full: set.teff(),
            tx_event_fifo_element_lost: set.tefl(),
            timestamp_wraparound: set.tsw(),
            message_ram_access_failure: set.mraf(),
            timeout_occurred: set.too(),
            message_stored_to_dedicated_rx_buffer: set.drx(),
            error_logging_overflow: set.elo(),
            error_passive: set.ep(),
            warning_status_changed: set.ew(),
            bus_off: set.bo(),
            watchdog: set.wdi(),
            protocol_error_arbitration: set.pea(),
            protocol_error_data: set.ped(),
            access_to_reserved_address: set.ara(),
        }
    }
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    /// Reads the interrupt flags and clears every flag that was read
    ///
    /// Flags raised between the read and the clear are kept for the next
    /// call.
    pub fn get_interrupt_status(&mut self) -> InterruptStatus {
        self.interrupt_flags_clear().into()
    }

    /// Flagged interrupts, cleared in the same step
    pub fn interrupt_flags_clear(&mut self) -> InterruptSet {
        let regs = self.regs();
        let flags = InterruptSet(regs.ir.get() & !RESERVED);
        // Writing 1 clears a flag; 0 leaves it unchanged
        regs.ir.set(flags.0);
        flags
    }

    /// Currently flagged interrupts, without clearing them
    pub fn interrupt_flags(&self) -> InterruptSet {
        InterruptSet(self.regs().ir.get() & !RESERVED)
    }

    /// Clears the indicated `interrupts`
    pub fn clear_interrupts(&mut self, interrupts: InterruptSet) {
        self.regs().ir.set(interrupts.bits());
    }

    /// Routes and enables the interrupts in `config`
    pub(crate) fn apply_interrupts(&mut self, config: &InterruptConfig) {
        let regs = self.regs();
        regs.ir.set(ALL);
        regs.ie
            .set(regs.ie.get() & RESERVED | config.enabled.bits());
        regs.ils
            .set(regs.ils.get() & RESERVED | config.line_1.bits());
        regs.ile.modify(|r: &mut crate::reg::Ile| {
            r.set_eint0(config.line_0_enabled);
            r.set_eint1(config.line_1_enabled);
        });
        // Per buffer interrupts are enabled by the Tx path
        regs.txbtie.set(0);
        regs.txbcie.set(0);
    }

    /// Reads back what [`Self::apply_interrupts`] wrote
    pub(crate) fn read_interrupts(&self) -> InterruptConfig {
        let regs = self.regs();
        let ile: crate::reg::Ile = regs.ile.read();
        InterruptConfig {
            enabled: InterruptSet(regs.ie.get() & ALL),
            line_1: InterruptSet(regs.ils.get() & ALL),
            line_0_enabled: ile.eint0(),
            line_1_enabled: ile.eint1(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::Harness;

    #[test]
    fn iter_preserves_length() {
        assert_eq!(InterruptSet(0).iter().count(), 0);
        assert_eq!(InterruptSet(1).iter().count(), 1);
        assert_eq!(InterruptSet(0x1555_5555).iter().count(), 14);
        assert_eq!(InterruptSet(0x2aaa_aaaa).iter().count(), 14);
        assert_eq!(InterruptSet(0x3fff_ffff).iter().count(), 28);
        assert_eq!(InterruptSet(0xffff_ffff).iter().count(), 28);
    }

    fn iter_collect(int: u32) -> u32 {
        InterruptSet::from_iter(InterruptSet(int).iter()).0
    }

    #[test]
    fn iter_collect_preserves_interrupts() {
        assert_eq!(iter_collect(0), 0);
        assert_eq!(iter_collect(1), 1);
        assert_eq!(iter_collect(0x1545_5555), 0x1545_5555);
        assert_eq!(iter_collect(0x2a8a_aaaa), 0x2a8a_aaaa);
    }

    #[test]
    fn iter_collect_drops_reserved_bits() {
        assert_eq!(iter_collect(0xffff_ffff), ALL);
    }

    #[test]
    fn reserved_bits_have_no_interrupt() {
        assert_eq!(Interrupt::try_from(20), Err(InvalidInterruptNumber));
        assert_eq!(Interrupt::try_from(21), Err(InvalidInterruptNumber));
        assert_eq!(Interrupt::try_from(22), Ok(Interrupt::ErrorLoggingOverflow));
    }

    #[test]
    fn status_is_read_and_cleared() {
        let h = Harness::new();
        let mut can = h.can();
        h.regs.ir.set(RESERVED | 1 << 25 | 1 << 3 | 1);
        let status = can.get_interrupt_status();
        assert!(status.bus_off && status.rx_fifo_0_message_lost && status.rx_fifo_0_new_message);
        assert!(!status.rx_fifo_0_full && !status.error_passive);
        // The zeroed test register keeps the written value; reserved bits
        // must not have been written
        assert_eq!(h.regs.ir.get(), 1 << 25 | 1 << 3 | 1);
    }

    #[test]
    fn enable_routes_to_line() {
        let mut config = InterruptConfig::default();
        let rx: InterruptSet = [Interrupt::RxFifo0NewMessage, Interrupt::BusOff]
            .into_iter()
            .collect();
        config.enable(rx, InterruptLine::Line1);
        config.enable(
            [Interrupt::BusOff].into_iter().collect(),
            InterruptLine::Line0,
        );
        assert_eq!(config.enabled.bits(), 1 << 25 | 1);
        assert_eq!(config.line_1.bits(), 1);
        assert!(config.line_0_enabled && config.line_1_enabled);
    }

    #[test]
    fn applying_keeps_reserved_bits() {
        let h = Harness::new();
        let mut can = h.can();
        h.regs.ie.set(RESERVED);
        h.regs.ils.set(1 << 20);
        h.regs.txbtie.set(0xff);
        let mut config = InterruptConfig::default();
        config.enable(InterruptSet::all(), InterruptLine::Line0);
        can.apply_interrupts(&config);
        assert_eq!(h.regs.ie.get(), RESERVED | ALL);
        assert_eq!(h.regs.ils.get(), 1 << 20);
        assert_eq!(h.regs.ile.get(), 1);
        assert_eq!(h.regs.txbtie.get(), 0);
        assert_eq!(can.read_interrupts(), config);
    }
}
