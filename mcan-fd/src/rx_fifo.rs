//! Rx FIFOs

use crate::bus::Mcan;
use crate::error::{Error, Result};
use crate::layout::Region;
use crate::message::{RxElement, HEADER_WORDS};
use crate::reg::{Access as _, Rxfs};
use mcan_fd_core::{CanId, Dependencies};
use vcell::VolatileCell;

/// Identifies one of the two Rx FIFOs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    /// Rx FIFO 0
    Fifo0,
    /// Rx FIFO 1
    Fifo1,
}

/// Fill state of an Rx FIFO
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFifoStatus {
    /// Number of frames waiting to be read
    pub count: u8,
    /// Every element holds a frame
    pub is_full: bool,
    /// A frame was discarded, or an unread one overwritten, because the FIFO
    /// was full. Reading the status does not clear it.
    pub is_message_lost: bool,
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    fn rx_fifo_registers(&self, fifo: RxFifo) -> (&VolatileCell<u32>, &VolatileCell<u32>) {
        let regs = self.regs();
        match fifo {
            RxFifo::Fifo0 => (&regs.rxf0s, &regs.rxf0a),
            RxFifo::Fifo1 => (&regs.rxf1s, &regs.rxf1a),
        }
    }

    fn rx_fifo_region(&self, fifo: RxFifo) -> Option<Region> {
        match fifo {
            RxFifo::Fifo0 => self.layout().rx_fifo_0,
            RxFifo::Fifo1 => self.layout().rx_fifo_1,
        }
    }

    /// Reads the oldest frame of `fifo` and releases its element
    pub fn rx_fifo_pull(&mut self, fifo: RxFifo) -> Result<RxElement> {
        let region = self.rx_fifo_region(fifo).ok_or(Error::InvalidRxFifoId)?;
        let (status, acknowledge) = self.rx_fifo_registers(fifo);
        let status: Rxfs = status.read();
        if status.ffl() == 0 {
            return Err(Error::RxFifoEmpty);
        }
        let index = status.fgi();
        let words = region.element(self.memory(), index)?;
        self.dependencies().memory_barrier();
        let element = RxElement::decode(words, (usize::from(region.stride) - HEADER_WORDS) * 4);
        acknowledge.set(index.into());
        Ok(element)
    }

    /// Reads the fill state of `fifo`
    pub fn get_rx_fifo_status(&self, fifo: RxFifo) -> Result<RxFifoStatus> {
        self.rx_fifo_region(fifo).ok_or(Error::InvalidRxFifoId)?;
        let status: Rxfs = self.rx_fifo_registers(fifo).0.read();
        Ok(RxFifoStatus {
            count: status.ffl(),
            is_full: status.ff(),
            is_message_lost: status.rfl(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BitTiming, Config, RxFifoConfig};
    use crate::message::{ElementSize, FrameType};
    use crate::test_util::{Harness, TestCan, TestDeps};
    use embedded_can::{Id, StandardId};

    const OFFSET: usize = 64;
    const STRIDE: usize = 4;

    fn configured(h: &Harness) -> Mcan<'static, TestCan, TestDeps> {
        let mut can = h.can();
        let mut config = Config::new(BitTiming::default());
        config.rx_fifo_0 = Some(RxFifoConfig {
            offset: OFFSET as u16,
            len: 4,
            element_size: ElementSize::Bytes8,
            ..Default::default()
        });
        can.set_config(&config, 10).unwrap();
        can
    }

    /// Stores a classic frame the way the controller would
    fn receive(h: &Harness, index: usize, id: u16, payload: u32) {
        let base = OFFSET + index * STRIDE;
        h.memory[base].set(u32::from(id) << 18);
        h.memory[base + 1].set(4 << 16 | index as u32);
        h.memory[base + 2].set(payload);
    }

    fn set_status(h: &Harness, fill: u8, get: u8) {
        let mut status = Rxfs(0);
        status.set_ffl(fill);
        status.set_fgi(get);
        h.regs.rxf0s.write(status);
    }

    #[test]
    fn frames_come_out_in_order() {
        let h = Harness::new();
        let mut can = configured(&h);
        for i in 0..4 {
            receive(&h, i, 0x100 + i as u16, 0x0101_0101 * (i as u32 + 1));
        }

        for i in 0..4u8 {
            set_status(&h, 4 - i, i);
            let frame = can.rx_fifo_pull(RxFifo::Fifo0).unwrap();
            assert_eq!(
                frame.id,
                Id::Standard(StandardId::new(0x100 + u16::from(i)).unwrap())
            );
            assert_eq!(frame.frame_type, FrameType::Data);
            assert_eq!(frame.timestamp, u16::from(i));
            assert_eq!(frame.data(), &[i + 1; 4]);
            assert_eq!(h.regs.rxf0a.get(), u32::from(i));
        }

        set_status(&h, 0, 0);
        assert_eq!(can.rx_fifo_pull(RxFifo::Fifo0), Err(Error::RxFifoEmpty));
    }

    #[test]
    fn empty_pull_is_not_acknowledged() {
        let h = Harness::new();
        let mut can = configured(&h);
        h.regs.rxf0a.set(0x3f);
        set_status(&h, 0, 2);
        assert_eq!(can.rx_fifo_pull(RxFifo::Fifo0), Err(Error::RxFifoEmpty));
        assert_eq!(h.regs.rxf0a.get(), 0x3f);
    }

    #[test]
    fn disabled_fifo_is_invalid() {
        let h = Harness::new();
        let mut can = configured(&h);
        h.regs.rxf1s.set(1);
        assert_eq!(can.rx_fifo_pull(RxFifo::Fifo1), Err(Error::InvalidRxFifoId));
        assert_eq!(can.get_rx_fifo_status(RxFifo::Fifo1), Err(Error::InvalidRxFifoId));
        assert_eq!(h.regs.rxf1a.get(), 0);
    }

    #[test]
    fn status_reflects_register() {
        let h = Harness::new();
        let can = configured(&h);
        let mut status = Rxfs(0);
        status.set_ffl(4);
        status.set_ff(true);
        status.set_rfl(true);
        h.regs.rxf0s.write(status);
        assert_eq!(
            can.get_rx_fifo_status(RxFifo::Fifo0),
            Ok(RxFifoStatus {
                count: 4,
                is_full: true,
                is_message_lost: true,
            })
        );
    }
}
