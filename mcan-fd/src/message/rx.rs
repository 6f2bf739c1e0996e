//! Messages received from the bus.

use super::*;

/// Largest data field of any element
const MAX_DATA: usize = 64;

/// Frame read out of an Rx FIFO or dedicated Rx buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxElement {
    /// CAN identifier of the frame
    pub id: Id,
    /// Data or remote frame
    pub frame_type: FrameType,
    /// The sender indicated that it is in "error passive" state
    pub error_passive: bool,
    /// Frame was received in CAN FD format
    pub fd_format: bool,
    /// Data phase was received at the data bit rate
    pub bit_rate_switching: bool,
    /// Index of the filter that accepted the frame. `None` if no filter
    /// matched, but the frame was accepted due to the non-matching frame
    /// policy.
    pub filter_index: Option<u8>,
    /// Timestamp counter value captured on start of frame reception
    pub timestamp: u16,
    /// Payload length in bytes as decoded from the data length code
    pub len: usize,
    data: [u8; MAX_DATA],
    stored: usize,
}

impl RxElement {
    /// Payload as stored in the element
    ///
    /// Shorter than `len` if the frame was larger than the elements of the
    /// region it was stored in.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.stored]
    }

    /// Decodes the element in `words` whose data field holds `capacity` bytes
    pub(crate) fn decode(words: &[VolatileCell<u32>], capacity: usize) -> Self {
        let r0 = IdHeader(words[0].get());
        let r1 = RxHeader(words[1].get());
        // FDF decides how the DLC is interpreted
        let fd_format = r1.fdf();
        let len = dlc_to_len(r1.dlc(), fd_format);
        let stored = if r0.rtr() { 0 } else { len.min(capacity) };
        let mut data = [0; MAX_DATA];
        read_data(&words[HEADER_WORDS..], &mut data[..stored]);
        Self {
            id: r0.can_id(),
            frame_type: r0.frame_type(),
            error_passive: r0.esi(),
            fd_format,
            bit_rate_switching: r1.brs(),
            filter_index: if r1.anmf() { None } else { Some(r1.fidx()) },
            timestamp: r1.rxts(),
            len,
            data,
            stored,
        }
    }
}
