//! CAN bus configuration

use crate::error::{Error, Result};
use crate::interrupt::InterruptConfig;
use crate::layout::Layout;
use crate::message::ElementSize;
use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Configuration for the CAN bus
///
/// Regions are placed in [`SharedMemory`] by word offsets; the caller is
/// responsible for a memory map where they do not overlap.
///
/// [`SharedMemory`]: crate::messageram::SharedMemory
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Operation mode
    pub mode: Mode,
    /// CAN FD operation; classic CAN only if `None`
    pub fd: Option<FdConfig>,
    /// Bit timing parameters for everything except the data phase of bit rate
    /// switched FD frames.
    pub nominal_timing: BitTiming,
    /// Timestamp counter configuration
    pub timestamp: Timestamp,
    /// Timeout counter configuration; disabled if `None`
    pub timeout: Option<Timeout>,
    /// Acceptance filtering of frames with standard IDs
    pub standard_id_filter: IdFilter,
    /// Acceptance filtering of frames with extended IDs
    pub extended_id_filter: IdFilter,
    /// Rx FIFO 0
    pub rx_fifo_0: Option<RxFifoConfig>,
    /// Rx FIFO 1
    pub rx_fifo_1: Option<RxFifoConfig>,
    /// Dedicated Rx buffers
    pub rx_buffer: Option<RxBufferConfig>,
    /// Dedicated Tx buffers and Tx FIFO/queue
    pub tx_buffer: Option<TxBufferConfig>,
    /// Tx event FIFO
    pub tx_event_fifo: Option<TxEventFifoConfig>,
    /// Interrupt enabling and line routing
    pub interrupts: InterruptConfig,
    /// Start value of the message RAM watchdog counter; 0 disables it
    pub ram_watchdog: u8,
}

impl Config {
    /// Create an instance
    ///
    /// Nominal bit timing must be provided, all other settings come
    /// pre-populated with default values. No message RAM region is enabled.
    pub fn new(nominal_timing: BitTiming) -> Self {
        Self {
            mode: Mode::default(),
            fd: None,
            nominal_timing,
            timestamp: Timestamp::default(),
            timeout: None,
            standard_id_filter: IdFilter::default(),
            extended_id_filter: IdFilter::default(),
            rx_fifo_0: None,
            rx_fifo_1: None,
            rx_buffer: None,
            tx_buffer: None,
            tx_event_fifo: None,
            interrupts: InterruptConfig::default(),
            ram_watchdog: 0,
        }
    }

    /// Checks every field against its hardware range and that all enabled
    /// regions fit in a shared memory of `memory_words` words.
    ///
    /// Nothing is written to the hardware; [`Mcan::set_config`] runs this
    /// before touching any register.
    ///
    /// [`Mcan::set_config`]: crate::bus::Mcan::set_config
    pub fn validate(&self, memory_words: usize) -> Result<()> {
        if self.mode == Mode::Invalid {
            return Err(Error::ModeInvalid);
        }
        self.nominal_timing
            .validate(&NOMINAL_BIT_TIMING_RANGES)
            .map_err(|_| Error::ConfigurationInvalid)?;
        if let Some(fd) = &self.fd {
            fd.data_timing
                .validate(&DATA_BIT_TIMING_RANGES)
                .map_err(|_| Error::ConfigurationInvalid)?;
            if let Some(tdc) = &fd.transmitter_delay_compensation {
                if tdc.filter > TDC_MAX || tdc.offset > TDC_MAX {
                    return Err(Error::ConfigurationInvalid);
                }
            }
        }
        if self.timestamp.prescaler > 15 {
            return Err(Error::ConfigurationInvalid);
        }

        check_filter_list(&self.standard_id_filter, MAX_STANDARD_FILTERS)?;
        check_filter_list(&self.extended_id_filter, MAX_EXTENDED_FILTERS)?;
        for fifo in [&self.rx_fifo_0, &self.rx_fifo_1].into_iter().flatten() {
            if !(1..=MAX_RX_ELEMENTS).contains(&fifo.len) {
                return Err(Error::LayoutInvalid);
            }
            if fifo.watermark > MAX_RX_ELEMENTS {
                return Err(Error::ConfigurationInvalid);
            }
        }
        if let Some(buffer) = &self.rx_buffer {
            if buffer.len > MAX_RX_ELEMENTS {
                return Err(Error::LayoutInvalid);
            }
        }
        if let Some(tx) = &self.tx_buffer {
            if u16::from(tx.buffer_len) + u16::from(tx.queue_len) > u16::from(MAX_TX_ELEMENTS) {
                return Err(Error::LayoutInvalid);
            }
        }
        if let Some(events) = &self.tx_event_fifo {
            if events.len > MAX_TX_ELEMENTS {
                return Err(Error::LayoutInvalid);
            }
            if events.watermark > MAX_TX_ELEMENTS {
                return Err(Error::ConfigurationInvalid);
            }
        }

        if Layout::from_config(self).fits(memory_words) {
            Ok(())
        } else {
            Err(Error::LayoutInvalid)
        }
    }
}

fn check_filter_list(filter: &IdFilter, max: u8) -> Result<()> {
    match filter {
        IdFilter::Filter { list, .. } if list.len > max => Err(Error::LayoutInvalid),
        _ => Ok(()),
    }
}

pub(crate) const MAX_STANDARD_FILTERS: u8 = 128;
pub(crate) const MAX_EXTENDED_FILTERS: u8 = 64;
pub(crate) const MAX_RX_ELEMENTS: u8 = 64;
pub(crate) const MAX_TX_ELEMENTS: u8 = 32;
const TDC_MAX: u8 = 0x7f;

/// Operation mode of the controller
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Regular operation
    #[default]
    Normal,
    /// Frames that lose arbitration or are disturbed by errors are not
    /// retransmitted
    AutomaticRetransmissionDisabled,
    /// Frames are received and acknowledged, but nothing is sent actively
    Restricted,
    /// Bus is listened to only; neither frames nor acknowledges are sent
    BusMonitoring,
    /// Clock is stopped after pending transfers finish
    PowerDown,
    /// Transmitted frames are looped back internally without reaching the bus
    InternalLoopBackTest,
    /// Hardware state that does not correspond to any mode above. Requesting
    /// it fails with [`Error::ModeInvalid`].
    Invalid,
}

/// CAN FD specific configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FdConfig {
    /// Bit timing parameters for the data phase of bit rate switched FD
    /// frames.
    ///
    /// Has to be configured even if bit rate switching is not allowed as
    /// *reception* of bit-rate-switched frames is still possible.
    pub data_timing: BitTiming,
    /// If `true`, FD frames can be transmitted with bit rate switching.
    pub allow_bit_rate_switching: bool,
    /// Transmitter delay compensation; disabled if `None`
    pub transmitter_delay_compensation: Option<TransmitterDelayCompensation>,
}

/// Transmitter delay compensation used at high data bit rates
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitterDelayCompensation {
    /// Filter window length, in time quanta. Valid values: 0..=127
    pub filter: u8,
    /// Offset of the secondary sample point, in time quanta. Valid values:
    /// 0..=127
    pub offset: u8,
}

/// Bit-timing parameters
///
/// The bit time is determined by
/// - the time quantum `t_q = (prescaler + 1) / f_can`
/// - the synchronization segment (one `t_q`)
/// - `segment_before_sample_point + 1` and `segment_after_sample_point + 1`
///   time quanta
///
/// This struct holds *raw* register values. The configurable ranges of the
/// parameters depend on which timing is changed.
///
/// Default values are the reset values of the timing registers:
/// - prescaler: 0x0
/// - sync_jump_width: 0x3
/// - segment_before_sample_point: 0xA
/// - segment_after_sample_point: 0x3
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Bit rate prescaler
    pub prescaler: u16,
    /// (Re)synchronization jump width
    pub sync_jump_width: u8,
    /// Propagation time and phase time before sample point; at least 1
    pub segment_before_sample_point: u8,
    /// Time after sample point
    pub segment_after_sample_point: u8,
}

impl Default for BitTiming {
    fn default() -> Self {
        Self {
            prescaler: 0x0,
            sync_jump_width: 0x3,
            segment_before_sample_point: 0xA,
            segment_after_sample_point: 0x3,
        }
    }
}

/// Misconfigurations of [`BitTiming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitTimingError {
    /// Prescaler is outside the wrapped `RangeInclusive`
    PrescalerOutOfRange(RangeInclusive<u32>),
    /// SJW is outside the wrapped `RangeInclusive`
    SynchronizationJumpWidthOutOfRange(RangeInclusive<u32>),
    /// Segment before sample point is outside the wrapped `RangeInclusive`
    PhaseSeg1OutOfRange(RangeInclusive<u32>),
    /// Segment after sample point is outside the wrapped `RangeInclusive`
    PhaseSeg2OutOfRange(RangeInclusive<u32>),
}

/// Valid raw values of a BitTiming struct
#[derive(Clone)]
pub struct BitTimingRanges {
    prescaler: RangeInclusive<u32>,
    sjw: RangeInclusive<u32>,
    phase_seg_1: RangeInclusive<u32>,
    phase_seg_2: RangeInclusive<u32>,
}

/// Ranges of the nominal bit timing register fields
pub const NOMINAL_BIT_TIMING_RANGES: BitTimingRanges = BitTimingRanges {
    prescaler: 0..=511,
    sjw: 0..=127,
    phase_seg_1: 1..=255,
    phase_seg_2: 0..=127,
};

/// Ranges of the data bit timing register fields
pub const DATA_BIT_TIMING_RANGES: BitTimingRanges = BitTimingRanges {
    prescaler: 0..=31,
    sjw: 0..=15,
    phase_seg_1: 1..=31,
    phase_seg_2: 0..=15,
};

impl BitTiming {
    /// Returns the number of time quanta that make up one bit time, `t_bit /
    /// t_q`
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.segment_before_sample_point)
            + 1
            + u32::from(self.segment_after_sample_point)
            + 1
    }

    /// Bit rate resulting from these parameters with a CAN clock of
    /// `can_clock`
    pub fn bit_rate(&self, can_clock: HertzU32) -> HertzU32 {
        can_clock / ((u32::from(self.prescaler) + 1) * self.time_quanta_per_bit())
    }

    /// Checks the raw values against `valid`
    pub fn validate(&self, valid: &BitTimingRanges) -> core::result::Result<(), BitTimingError> {
        if !valid.prescaler.contains(&self.prescaler.into()) {
            Err(BitTimingError::PrescalerOutOfRange(valid.prescaler.clone()))
        } else if !valid.sjw.contains(&self.sync_jump_width.into()) {
            Err(BitTimingError::SynchronizationJumpWidthOutOfRange(
                valid.sjw.clone(),
            ))
        } else if !valid
            .phase_seg_1
            .contains(&self.segment_before_sample_point.into())
        {
            Err(BitTimingError::PhaseSeg1OutOfRange(
                valid.phase_seg_1.clone(),
            ))
        } else if !valid
            .phase_seg_2
            .contains(&self.segment_after_sample_point.into())
        {
            Err(BitTimingError::PhaseSeg2OutOfRange(
                valid.phase_seg_2.clone(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Timestamp counter configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Counting mode of time stamp timer
    pub clock: TimestampClock,
    /// Raw timestamp and timeout counter prescaler; the counters advance once
    /// every `prescaler + 1` bit times. Valid values: 0..=15
    pub prescaler: u8,
}

/// Source of the timestamp counter
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimestampClock {
    /// Counter stays at 0
    #[default]
    None = 0,
    /// Counter is incremented by the internal, prescaled bit time clock
    Internal = 1,
    /// Counter value is taken from an external source
    External = 2,
}

impl TimestampClock {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Internal,
            2 => Self::External,
            _ => Self::None,
        }
    }
}

/// Timeout counter configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    /// What drives the counter
    pub kind: TimeoutKind,
    /// Start value of the down-counter
    pub period: u16,
}

/// Operation of the timeout counter
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutKind {
    /// Counts down continuously
    #[default]
    Continuous = 0,
    /// Controlled by the Tx event FIFO
    TxEventFifo = 1,
    /// Controlled by the Rx FIFO 0
    RxFifo0 = 2,
    /// Controlled by the Rx FIFO 1
    RxFifo1 = 3,
}

impl TimeoutKind {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Continuous,
            1 => Self::TxEventFifo,
            2 => Self::RxFifo0,
            _ => Self::RxFifo1,
        }
    }
}

/// Acceptance filtering for one ID width
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdFilter {
    /// Remote frames with this ID width are rejected and no filter list is
    /// used. Data frames fall through to Rx FIFO 0.
    RejectAll,
    /// Frames are run through a filter list
    Filter {
        /// What to do with frames that match no filter
        non_matching: NonMatchingPolicy,
        /// Placement of the filter list
        list: FilterList,
    },
}

impl Default for IdFilter {
    fn default() -> Self {
        Self::Filter {
            non_matching: NonMatchingPolicy::Reject,
            list: FilterList::default(),
        }
    }
}

/// Placement of a filter list in message RAM
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterList {
    /// Offset of the first filter, in words
    pub offset: u16,
    /// Number of filters. At most 128 standard or 64 extended filters.
    pub len: u8,
}

/// Handling of frames that match no filter
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NonMatchingPolicy {
    /// Store in Rx FIFO 0
    RxFifo0 = 0,
    /// Store in Rx FIFO 1
    RxFifo1 = 1,
    /// Discard
    #[default]
    Reject = 2,
}

impl NonMatchingPolicy {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::RxFifo0,
            1 => Self::RxFifo1,
            _ => Self::Reject,
        }
    }
}

/// Denotes a RX FIFO configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFifoConfig {
    /// Offset of the first element, in words
    pub offset: u16,
    /// Number of elements. Valid values: 1..=64
    pub len: u8,
    /// Denotes queue fullness required to trigger a corresponding interrupt;
    /// 0 means that interrupt is disabled. Valid values: 0..=64
    pub watermark: u8,
    /// FIFO mode
    pub mode: RxFifoMode,
    /// Data field size of every element
    pub element_size: ElementSize,
}

/// Mode of operation for the RX FIFO
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifoMode {
    /// When the RX FIFO is full, incoming messages are dropped until at least
    /// one message has been read out from the FIFO.
    #[default]
    Blocking,
    /// When the RX FIFO is full, the oldest message is overwritten.
    ///
    /// The controller does not protect the element being read from being
    /// overwritten at the same time; readers should stay away from the oldest
    /// element.
    Overwrite,
}

/// Dedicated Rx buffers configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxBufferConfig {
    /// Offset of the first buffer, in words
    pub offset: u16,
    /// Number of buffers. Valid values: 0..=64
    pub len: u8,
    /// Data field size of every buffer
    pub element_size: ElementSize,
}

/// Dedicated Tx buffers and Tx FIFO/queue configuration
///
/// The queue elements directly follow the dedicated buffers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxBufferConfig {
    /// Offset of the first buffer, in words
    pub offset: u16,
    /// Number of dedicated buffers
    pub buffer_len: u8,
    /// Number of FIFO/queue elements; together with `buffer_len` at most 32
    pub queue_len: u8,
    /// Queue submode
    pub queue_mode: TxQueueMode,
    /// Data field size of every element
    pub element_size: ElementSize,
}

/// Mode of operation for the transmit queue
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxQueueMode {
    /// Messages are sent according to the order they are enqueued
    #[default]
    Fifo,
    /// Messages are sent according to their priority
    ///
    /// Lower ID means higher priority. Messages of the same ID are sent in an
    /// arbitrary order. This is the same order as arbitration on the bus would
    /// give.
    Priority,
}

/// Tx event FIFO configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventFifoConfig {
    /// Offset of the first element, in words
    pub offset: u16,
    /// Number of elements. Valid values: 0..=32
    pub len: u8,
    /// Denotes queue fullness required to trigger a corresponding interrupt;
    /// 0 means that interrupt is disabled. Valid values: 0..=32
    pub watermark: u8,
}
