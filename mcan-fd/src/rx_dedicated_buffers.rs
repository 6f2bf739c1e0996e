//! Dedicated Rx buffers
//!
//! Frames land in a fixed buffer chosen by a store-to-buffer filter. The
//! controller raises the buffer's new data flag in NDAT1/NDAT2 when it has
//! written the element; software clears the flag once it is done with it.

use crate::bus::Mcan;
use crate::error::{Error, Result};
use crate::message::{RxElement, HEADER_WORDS};
use mcan_fd_core::{CanId, Dependencies};
use vcell::VolatileCell;

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    fn ndat(&self, index: u8) -> Result<(&VolatileCell<u32>, u32)> {
        let len = self.layout().rx_buffer.map_or(0, |region| region.len);
        if index >= len {
            return Err(Error::IndexOutOfRange);
        }
        let regs = self.regs();
        Ok(if index < 32 {
            (&regs.ndat1, 1 << index)
        } else {
            (&regs.ndat2, 1 << (index - 32))
        })
    }

    /// Reads dedicated Rx buffer `index` regardless of its new data flag
    pub fn rx_buffer_get(&self, index: u8) -> Result<RxElement> {
        let region = self.layout().rx_buffer.ok_or(Error::IndexOutOfRange)?;
        let words = region.element(self.memory(), index)?;
        self.dependencies().memory_barrier();
        Ok(RxElement::decode(
            words,
            (usize::from(region.stride) - HEADER_WORDS) * 4,
        ))
    }

    /// `true` if the controller stored a frame in buffer `index` that was not
    /// yet marked as read
    pub fn rx_buffer_has_new_data(&self, index: u8) -> Result<bool> {
        let (ndat, mask) = self.ndat(index)?;
        Ok(ndat.get() & mask != 0)
    }

    /// Marks buffer `index` as read, allowing the controller to store the next
    /// frame in it
    pub fn rx_buffer_clear_new_data(&mut self, index: u8) -> Result<()> {
        let (ndat, mask) = self.ndat(index)?;
        // Write 1 to clear; zeros leave the other flags alone.
        ndat.set(mask);
        Ok(())
    }

    /// Returns the frame in buffer `index` and marks it as read if new data is
    /// available
    pub fn rx_buffer_receive(&mut self, index: u8) -> nb::Result<RxElement, Error> {
        if !self.rx_buffer_has_new_data(index)? {
            return Err(nb::Error::WouldBlock);
        }
        let element = self.rx_buffer_get(index)?;
        self.rx_buffer_clear_new_data(index)?;
        Ok(element)
    }
}
