//! Events for messages sent on the bus

use super::*;

/// Record the peripheral stores for a transmitted frame that requested it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventElement {
    /// CAN identifier of the frame
    pub id: Id,
    /// Data or remote frame
    pub frame_type: FrameType,
    /// Error state indicator the frame was sent with
    pub error_passive: bool,
    /// Marker of the Tx element the frame was sent from
    pub marker: u8,
    /// Kind of the event
    pub event_type: TxEventType,
    /// Frame was sent in CAN FD format
    pub fd_format: bool,
    /// Data phase was sent at the data bit rate
    pub bit_rate_switching: bool,
    /// Payload length in bytes
    pub len: usize,
    /// Timestamp counter value captured on start of frame transmission
    pub timestamp: u16,
}

/// Kind of a Tx event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxEventType {
    /// Value the peripheral does not define
    Reserved,
    /// Frame was transmitted
    TxEvent = 1,
    /// Frame was transmitted although its cancellation was requested
    TxInSpiteOfCancellation = 2,
}

impl From<u8> for TxEventType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::TxEvent,
            2 => Self::TxInSpiteOfCancellation,
            _ => Self::Reserved,
        }
    }
}

impl TxEventElement {
    pub(crate) fn decode(words: &[VolatileCell<u32>]) -> Self {
        let e0 = IdHeader(words[0].get());
        let e1 = TxEventHeader(words[1].get());
        let fd_format = e1.fdf();
        Self {
            id: e0.can_id(),
            frame_type: e0.frame_type(),
            error_passive: e0.esi(),
            marker: e1.mm(),
            event_type: e1.et().into(),
            fd_format,
            bit_rate_switching: e1.brs(),
            len: dlc_to_len(e1.dlc(), fd_format),
            timestamp: e1.txts(),
        }
    }
}
