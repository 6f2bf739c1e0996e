//! Transmit queue and dedicated buffers
//!
//! Dedicated buffers occupy the first elements of the Tx region, the FIFO or
//! priority queue the rest.

use crate::bus::Mcan;
use crate::error::{Error, Result};
use crate::message::{TxElement, HEADER_WORDS};
use crate::reg::{Access as _, Txfqs};
use mcan_fd_core::{CanId, Dependencies};

/// State of the Tx FIFO/queue
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxQueueStatus {
    /// No element is free
    pub is_full: bool,
    /// Number of free elements
    pub free_level: u8,
}

fn bit(index: u8) -> u32 {
    1_u32.checked_shl(index.into()).unwrap_or(0)
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    /// Puts a frame in dedicated transmit buffer `index` and requests its
    /// transmission.
    ///
    /// A pending transmission from the same buffer is overwritten.
    pub fn tx_buffer_add(&mut self, element: &TxElement<'_>, index: u8) -> Result<()> {
        if index >= self.layout().tx_dedicated {
            return Err(Error::IndexOutOfRange);
        }
        self.transmit(element, index)
    }

    /// Puts a frame in the Tx FIFO/queue to be sent on the bus, returning the
    /// index of the element it was put in.
    pub fn tx_queue_push(&mut self, element: &TxElement<'_>) -> Result<u8> {
        if self.layout().tx_queue_len() == 0 {
            return Err(Error::IndexOutOfRange);
        }
        // Full flag and put index come from a single read; whether the
        // controller can move the index between them is not documented.
        let txfqs: Txfqs = self.regs().txfqs.read();
        if txfqs.tfqf() {
            return Err(Error::TxFifoFull);
        }
        let index = txfqs.tfqpi();
        self.transmit(element, index)?;
        Ok(index)
    }

    fn transmit(&mut self, element: &TxElement<'_>, index: u8) -> Result<()> {
        let region = self.layout().tx_buffer.ok_or(Error::IndexOutOfRange)?;
        let words = region.element(self.memory(), index)?;
        let capacity = (usize::from(region.stride) - HEADER_WORDS) * 4;
        let dlc = element.dlc_for(capacity)?;

        words.iter().for_each(|word| word.set(0));
        element.write(words, dlc);
        self.dependencies().memory_barrier();

        let regs = self.regs();
        let txbtie = regs.txbtie.get();
        regs.txbtie.set(if element.interrupt_enabled {
            txbtie | bit(index)
        } else {
            txbtie & !bit(index)
        });
        regs.txbar.set(bit(index));
        Ok(())
    }

    /// `true` if the last transmission requested from buffer `index` has
    /// finished successfully. The flag is cleared when a new transmission is
    /// requested for the buffer.
    pub fn tx_buffer_is_transmission_finished(&self, index: u8) -> bool {
        self.regs().txbto.get() & bit(index) != 0
    }

    /// Non-blocking wait for the transmission from buffer `index`, for use with
    /// [`nb::block!`]
    pub fn tx_buffer_poll_transmission(&self, index: u8) -> nb::Result<(), Error> {
        if index >= self.layout().tx_dedicated {
            Err(nb::Error::Other(Error::IndexOutOfRange))
        } else if self.tx_buffer_is_transmission_finished(index) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Reads the Tx FIFO/queue fill state
    pub fn get_tx_queue_status(&self) -> TxQueueStatus {
        let txfqs: Txfqs = self.regs().txfqs.read();
        TxQueueStatus {
            is_full: txfqs.tfqf(),
            free_level: txfqs.tffl(),
        }
    }

    /// `true` if every element of the Tx FIFO is free
    pub fn is_tx_fifo_empty(&self) -> bool {
        let txfqs: Txfqs = self.regs().txfqs.read();
        txfqs.tffl() == self.layout().tx_queue_len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bus::Mcan;
    use crate::config::{BitTiming, Config, TxBufferConfig};
    use crate::message::{ElementSize, FrameType};
    use crate::test_util::{Harness, TestCan, TestDeps};
    use embedded_can::StandardId;

    const TX_OFFSET: usize = 16;

    fn configured() -> (Harness, Mcan<'static, TestCan, TestDeps>) {
        let h = Harness::new();
        let mut can = h.can();
        let mut config = Config::new(BitTiming::default());
        config.tx_buffer = Some(TxBufferConfig {
            offset: TX_OFFSET as u16,
            buffer_len: 2,
            queue_len: 3,
            element_size: ElementSize::Bytes8,
            ..Default::default()
        });
        can.set_config(&config, 10).unwrap();
        (h, can)
    }

    fn untouched(h: &Harness) -> bool {
        h.memory.iter().all(|w| w.get() == 0) && h.regs.txbar.get() == 0
    }

    #[test]
    fn dedicated_buffer_is_filled_and_requested() {
        let (h, mut can) = configured();
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut element = TxElement::new(StandardId::new(0x55).unwrap(), &data);
        element.interrupt_enabled = true;
        assert_eq!(can.tx_buffer_add(&element, 1), Ok(()));
        let base = TX_OFFSET + 4;
        assert_eq!(h.word(base), 0x55 << 18);
        assert_eq!(h.word(base + 1), 8 << 16);
        assert_eq!(h.word(base + 2), 0x0403_0201);
        assert_eq!(h.word(base + 3), 0x0807_0605);
        assert_eq!(h.regs.txbar.get(), 1 << 1);
        assert_eq!(h.regs.txbtie.get(), 1 << 1);
    }

    #[test]
    fn barrier_precedes_request() {
        let (h, mut can) = configured();
        let before = h.barriers.get();
        can.tx_buffer_add(&TxElement::new(StandardId::ZERO, &[]), 0)
            .unwrap();
        assert_eq!(h.barriers.get(), before + 1);
        assert_eq!(h.txbar_at_barrier.get(), 0);
        assert_eq!(h.regs.txbar.get(), 1);
    }

    #[test]
    fn index_past_dedicated_buffers_is_rejected() {
        let (h, mut can) = configured();
        let element = TxElement::new(StandardId::ZERO, &[0xff]);
        assert_eq!(can.tx_buffer_add(&element, 2), Err(Error::IndexOutOfRange));
        assert!(untouched(&h));
    }

    #[test]
    fn frame_larger_than_element_is_rejected() {
        let (h, mut can) = configured();
        let data = [0; 12];
        let mut element = TxElement::new(StandardId::ZERO, &data);
        element.fd_format = true;
        assert_eq!(can.tx_buffer_add(&element, 0), Err(Error::ElementSizeInvalid));
        assert!(untouched(&h));
    }

    #[test]
    fn remote_frame_ignores_capacity() {
        let (h, mut can) = configured();
        let data = [0; 8];
        let mut element = TxElement::new(StandardId::ZERO, &data);
        element.frame_type = FrameType::Remote;
        assert_eq!(can.tx_buffer_add(&element, 0), Ok(()));
        assert_eq!(h.word(TX_OFFSET), 1 << 29);
    }

    #[test]
    fn full_queue_is_not_written() {
        let (h, mut can) = configured();
        let mut txfqs = Txfqs(0);
        txfqs.set_tfqf(true);
        txfqs.set_tfqpi(3);
        h.regs.txfqs.write(txfqs);
        let element = TxElement::new(StandardId::ZERO, &[1]);
        assert_eq!(can.tx_queue_push(&element), Err(Error::TxFifoFull));
        assert!(untouched(&h));
        assert!(can.get_tx_queue_status().is_full);
    }

    #[test]
    fn queue_uses_put_index() {
        let (h, mut can) = configured();
        let mut txfqs = Txfqs(0);
        txfqs.set_tfqpi(3);
        txfqs.set_tffl(3);
        h.regs.txfqs.write(txfqs);
        assert!(can.is_tx_fifo_empty());
        let element = TxElement::new(StandardId::new(1).unwrap(), &[0xab]);
        assert_eq!(can.tx_queue_push(&element), Ok(3));
        assert_eq!(h.word(TX_OFFSET + 3 * 4), 1 << 18);
        assert_eq!(h.word(TX_OFFSET + 3 * 4 + 2), 0xab);
        assert_eq!(h.regs.txbar.get(), 1 << 3);
    }

    #[test]
    fn queue_needs_elements() {
        let h = Harness::new();
        let mut can = h.can();
        can.set_config(&Config::new(BitTiming::default()), 10)
            .unwrap();
        let element = TxElement::new(StandardId::ZERO, &[]);
        assert_eq!(can.tx_queue_push(&element), Err(Error::IndexOutOfRange));
    }

    #[test]
    fn transmission_is_polled() {
        let (h, can) = configured();
        assert_eq!(can.tx_buffer_poll_transmission(1), Err(nb::Error::WouldBlock));
        h.regs.txbto.set(1 << 1);
        assert!(can.tx_buffer_is_transmission_finished(1));
        assert_eq!(can.tx_buffer_poll_transmission(1), Ok(()));
        // Queue elements are not dedicated buffers
        h.regs.txbto.set(1 << 2);
        assert_eq!(
            can.tx_buffer_poll_transmission(2),
            Err(nb::Error::Other(Error::IndexOutOfRange))
        );
    }
}
