//! Driver errors

/// Errors reported by the driver core
///
/// All of them are local, synchronous conditions the caller can recover from
/// by retrying or reconfiguring.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The Rx FIFO was never enabled
    InvalidRxFifoId,
    /// The Rx FIFO holds no elements
    RxFifoEmpty,
    /// The Tx queue has no free slot
    TxFifoFull,
    /// The Tx event FIFO holds no elements
    TxEventFifoEmpty,
    /// The controller did not acknowledge the initialization request in time
    InitializationStartTimeout,
    /// The controller did not acknowledge the clock stop request in time
    ClockStopRequestTimeout,
    /// Element index is outside of the configured region
    IndexOutOfRange,
    /// Payload length has no data length code or does not fit the element
    ElementSizeInvalid,
    /// Requested operation mode is not valid
    ModeInvalid,
    /// A timing, prescaler or delay compensation field is out of range
    ConfigurationInvalid,
    /// A region element count is out of range or the region does not fit in
    /// the shared memory
    LayoutInvalid,
}

/// Driver wide result type
pub type Result<T> = core::result::Result<T, Error>;

const fn error_code(n: u8) -> u32 {
    (b'C' as u32) << 24 | (b'A' as u32) << 16 | (b'N' as u32) << 8 | n as u32
}

impl Error {
    /// Numeric error code, `'C' 'A' 'N' n` packed big-endian into a word
    pub const fn code(self) -> u32 {
        error_code(match self {
            Self::InvalidRxFifoId => 1,
            Self::RxFifoEmpty => 2,
            Self::TxFifoFull => 3,
            Self::TxEventFifoEmpty => 4,
            Self::InitializationStartTimeout => 5,
            Self::ClockStopRequestTimeout => 6,
            Self::IndexOutOfRange => 7,
            Self::ElementSizeInvalid => 8,
            Self::ModeInvalid => 9,
            Self::ConfigurationInvalid => 10,
            Self::LayoutInvalid => 11,
        })
    }
}

impl embedded_can::Error for Error {
    fn kind(&self) -> embedded_can::ErrorKind {
        embedded_can::ErrorKind::Other
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_carry_module_tag() {
        assert_eq!(Error::InvalidRxFifoId.code(), 0x4341_4E01);
        assert_eq!(Error::ModeInvalid.code(), 0x4341_4E09);
        assert_eq!(Error::LayoutInvalid.code(), 0x4341_4E0B);
    }
}
