//! Tx event FIFO

use crate::bus::Mcan;
use crate::error::{Error, Result};
use crate::message::TxEventElement;
use crate::reg::{Access as _, Txefs};
use mcan_fd_core::{CanId, Dependencies};

/// Fill state of the Tx event FIFO
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEventFifoStatus {
    /// Number of events waiting to be read
    pub count: u8,
    /// Every element holds an event
    pub is_full: bool,
    /// An event was discarded because the FIFO was full. Stays set until the
    /// interrupt flag is cleared.
    pub is_message_lost: bool,
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    /// Reads the oldest event and releases its element
    pub fn tx_event_fifo_pull(&mut self) -> Result<TxEventElement> {
        let region = self.layout().tx_event_fifo.ok_or(Error::IndexOutOfRange)?;
        let status: Txefs = self.regs().txefs.read();
        if status.effl() == 0 {
            return Err(Error::TxEventFifoEmpty);
        }
        let index = status.efgi();
        let words = region.element(self.memory(), index)?;
        let event = TxEventElement::decode(words);
        self.dependencies().memory_barrier();
        self.regs().txefa.set(index.into());
        Ok(event)
    }

    /// Reads the Tx event FIFO fill state
    pub fn get_tx_event_fifo_status(&self) -> TxEventFifoStatus {
        let status: Txefs = self.regs().txefs.read();
        TxEventFifoStatus {
            count: status.effl(),
            is_full: status.eff(),
            is_message_lost: status.tefl(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BitTiming, Config, TxEventFifoConfig};
    use crate::message::TxEventType;
    use crate::test_util::{Harness, TestCan, TestDeps};
    use embedded_can::{ExtendedId, Id};

    const OFFSET: usize = 40;

    fn configured(h: &Harness) -> Mcan<'static, TestCan, TestDeps> {
        let mut can = h.can();
        let mut config = Config::new(BitTiming::default());
        config.tx_event_fifo = Some(TxEventFifoConfig {
            offset: OFFSET as u16,
            len: 4,
            watermark: 0,
        });
        can.set_config(&config, 10).unwrap();
        can
    }

    #[test]
    fn empty_fifo_is_not_acknowledged() {
        let h = Harness::new();
        let mut can = configured(&h);
        h.regs.txefa.set(0xff);
        assert_eq!(can.tx_event_fifo_pull(), Err(Error::TxEventFifoEmpty));
        assert_eq!(h.regs.txefa.get(), 0xff);
    }

    #[test]
    fn event_at_get_index_is_pulled() {
        let h = Harness::new();
        let mut can = configured(&h);
        h.memory[OFFSET + 2 * 2].set(1 << 30 | 0x1234_5678);
        h.memory[OFFSET + 2 * 2 + 1].set(7 << 24 | 1 << 22 | 4 << 16 | 0x00aa);
        let mut status = Txefs(0);
        status.set_effl(1);
        status.set_efgi(2);
        h.regs.txefs.write(status);
        let before = h.barriers.get();

        let event = can.tx_event_fifo_pull().unwrap();
        assert_eq!(event.id, Id::Extended(ExtendedId::new(0x1234_5678).unwrap()));
        assert_eq!(event.marker, 7);
        assert_eq!(event.event_type, TxEventType::TxEvent);
        assert_eq!(event.len, 4);
        assert_eq!(event.timestamp, 0xaa);
        assert_eq!(h.barriers.get(), before + 1);
        assert_eq!(h.regs.txefa.get(), 2);
    }

    #[test]
    fn status_reflects_register() {
        let h = Harness::new();
        let can = configured(&h);
        let mut status = Txefs(0);
        status.set_effl(4);
        status.set_eff(true);
        status.set_tefl(true);
        h.regs.txefs.write(status);
        assert_eq!(
            can.get_tx_event_fifo_status(),
            TxEventFifoStatus {
                count: 4,
                is_full: true,
                is_message_lost: true,
            }
        );
    }

    #[test]
    fn disabled_fifo_is_out_of_range() {
        let h = Harness::new();
        let mut can = h.can();
        assert_eq!(can.tx_event_fifo_pull(), Err(Error::IndexOutOfRange));
    }
}
