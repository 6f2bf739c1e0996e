//! Messages to be sent on the bus

use super::*;

/// Describes a CAN frame that is not yet converted to the representation the
/// peripheral understands.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxElement<'a> {
    /// CAN identifier for the frame
    pub id: Id,
    /// Data or remote frame
    pub frame_type: FrameType,
    /// If `true`, the error state indicator of the message will indicate
    /// 'error passive'. If `false`, the actual state of the peripheral will be
    /// indicated.
    pub error_passive: bool,
    /// Copied to the Tx event element of this frame
    pub marker: u8,
    /// If `true`, this frame stores an event identified by `marker` in the Tx
    /// event FIFO.
    pub store_tx_event: bool,
    /// CAN FD frame. Note that the peripheral must be configured with CAN FD
    /// enabled to transmit this format.
    pub fd_format: bool,
    /// Parts of the frame are transmitted at the data bit rate. Bit rate
    /// switching must be allowed in the peripheral configuration as well.
    pub bit_rate_switching: bool,
    /// Raise the transmission occurred interrupt once this frame is sent
    pub interrupt_enabled: bool,
    /// Payload. For remote frames only its length is used, as the length of
    /// the requested frame.
    pub data: &'a [u8],
}

impl<'a> TxElement<'a> {
    /// Classic data frame carrying `data`
    pub fn new(id: impl Into<Id>, data: &'a [u8]) -> Self {
        Self {
            id: id.into(),
            frame_type: FrameType::Data,
            error_passive: false,
            marker: 0,
            store_tx_event: false,
            fd_format: false,
            bit_rate_switching: false,
            interrupt_enabled: false,
            data,
        }
    }

    /// Data length code of this frame in an element with `capacity` data
    /// bytes
    pub(crate) fn dlc_for(&self, capacity: usize) -> Result<u8> {
        let len = self.data.len();
        let dlc = len_to_dlc(len)?;
        if (!self.fd_format && len > 8) || (self.frame_type == FrameType::Data && len > capacity)
        {
            return Err(Error::ElementSizeInvalid);
        }
        Ok(dlc)
    }

    /// Packs the frame into `words`, which must be zeroed first
    pub(crate) fn write(&self, words: &[VolatileCell<u32>], dlc: u8) {
        let mut t0 = IdHeader(0);
        t0.set_can_id(self.id);
        t0.set_rtr(self.frame_type == FrameType::Remote);
        t0.set_esi(self.error_passive);
        let mut t1 = TxHeader(0);
        t1.set_dlc(dlc);
        t1.set_brs(self.bit_rate_switching);
        t1.set_fdf(self.fd_format);
        t1.set_efc(self.store_tx_event);
        t1.set_mm(self.marker);
        words[0].set(t0.0);
        words[1].set(t1.0);
        if self.frame_type == FrameType::Data {
            write_data(&words[HEADER_WORDS..], self.data);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zeroed<const N: usize>() -> [VolatileCell<u32>; N] {
        core::array::from_fn(|_| VolatileCell::new(0))
    }

    #[test]
    fn classic_frame_packs_header() {
        let words = zeroed::<4>();
        let mut element = TxElement::new(StandardId::new(0x7ff).unwrap(), &[0xaa, 0xbb, 0xcc]);
        element.store_tx_event = true;
        element.marker = 0x5a;
        let dlc = element.dlc_for(8).unwrap();
        element.write(&words, dlc);
        assert_eq!(words[0].get(), 0x7ff << 18);
        assert_eq!(words[1].get(), 0x5a << 24 | 1 << 23 | 3 << 16);
        assert_eq!(words[2].get(), 0x00cc_bbaa);
    }

    #[test]
    fn fd_frame_packs_flags() {
        let words = zeroed::<18>();
        let data = [0x11; 64];
        let mut element = TxElement::new(ExtendedId::new(0x1234_5678).unwrap(), &data);
        element.fd_format = true;
        element.bit_rate_switching = true;
        element.error_passive = true;
        let dlc = element.dlc_for(64).unwrap();
        element.write(&words, dlc);
        assert_eq!(words[0].get(), 1 << 31 | 1 << 30 | 0x1234_5678);
        assert_eq!(words[1].get(), 1 << 21 | 1 << 20 | 15 << 16);
        assert_eq!(words[17].get(), 0x1111_1111);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let data = [0; 12];
        let mut element = TxElement::new(StandardId::ZERO, &data);
        // Classic frames carry at most 8 bytes
        assert_eq!(element.dlc_for(64), Err(Error::ElementSizeInvalid));
        element.fd_format = true;
        assert_eq!(element.dlc_for(64), Ok(9));
        assert_eq!(element.dlc_for(8), Err(Error::ElementSizeInvalid));
        element.data = &data[..10];
        assert_eq!(element.dlc_for(64), Err(Error::ElementSizeInvalid));
    }

    #[test]
    fn remote_frame_has_no_payload() {
        let words = zeroed::<4>();
        let data = [0xff; 4];
        let mut element = TxElement::new(StandardId::new(0x10).unwrap(), &data);
        element.frame_type = FrameType::Remote;
        let dlc = element.dlc_for(8).unwrap();
        element.write(&words, dlc);
        assert_eq!(words[0].get(), 1 << 29 | 0x10 << 18);
        assert_eq!(words[1].get(), 4 << 16);
        assert_eq!(words[2].get(), 0);
    }
}
