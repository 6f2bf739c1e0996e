//! Host stand-ins for the controller registers, message RAM and platform hooks

extern crate std;

use crate::bus::Mcan;
use crate::messageram::SharedMemory;
use crate::reg::{Access as _, Cccr, RegisterBlock, Registers};
use core::cell::Cell;
use core::mem::MaybeUninit;
use fugit::HertzU32;
use mcan_fd_core::{CanId, Dependencies};
use std::boxed::Box;
use vcell::VolatileCell;

/// Controller without hardware behind it
pub(crate) enum TestCan {}

unsafe impl CanId for TestCan {
    const ADDRESS: *const () = core::ptr::null();
    const DMA_BASE_ADDRESS: *const () = core::ptr::null();
}

/// 16K words of message RAM that never cross a 64K window
#[repr(C, align(16384))]
struct TestRam(SharedMemory<4096>);

fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub(crate) struct Harness {
    pub regs: &'static RegisterBlock,
    pub dma_base: &'static VolatileCell<u32>,
    pub memory: &'static [VolatileCell<u32>],
    pub barriers: &'static Cell<u32>,
    /// TXBAR as seen by the last barrier
    pub txbar_at_barrier: &'static Cell<u32>,
}

impl Harness {
    pub fn new() -> Self {
        // Safety: All bits 0 is a valid value for a block of volatile cells.
        let regs = leak(unsafe { MaybeUninit::<RegisterBlock>::zeroed().assume_init() });
        let ram = Box::leak(Box::new(TestRam(SharedMemory::new())));
        Self {
            regs,
            dma_base: leak(VolatileCell::new(0)),
            memory: ram.0.init(),
            barriers: leak(Cell::new(0)),
            txbar_at_barrier: leak(Cell::new(0)),
        }
    }

    pub fn registers(&self) -> Registers {
        // Safety: Both are leaked and only used through the handles of this
        // harness.
        unsafe { Registers::from_raw(self.regs, self.dma_base) }
    }

    pub fn deps(&self) -> TestDeps {
        TestDeps {
            regs: self.regs,
            barriers: self.barriers,
            txbar_at_barrier: self.txbar_at_barrier,
            stall: false,
            ack_clock_stop: false,
        }
    }

    pub fn can(&self) -> Mcan<'static, TestCan, TestDeps> {
        self.can_with(self.deps())
    }

    pub fn can_with(&self, deps: TestDeps) -> Mcan<'static, TestCan, TestDeps> {
        Mcan::from_parts(self.registers(), deps, self.memory)
    }

    /// Word `index` of message RAM
    pub fn word(&self, index: usize) -> u32 {
        self.memory[index].get()
    }
}

pub(crate) struct TestDeps {
    pub regs: &'static RegisterBlock,
    pub barriers: &'static Cell<u32>,
    pub txbar_at_barrier: &'static Cell<u32>,
    /// The controller never acknowledges anything
    pub stall: bool,
    /// Clock stop requests are acknowledged while waiting
    pub ack_clock_stop: bool,
}

unsafe impl Dependencies<TestCan> for TestDeps {
    fn can_clock(&self) -> HertzU32 {
        HertzU32::MHz(32)
    }

    fn memory_barrier(&self) {
        self.barriers.set(self.barriers.get() + 1);
        self.txbar_at_barrier.set(self.regs.txbar.get());
    }

    fn wait_until(&self, mut condition: impl FnMut() -> bool, timeout: u32) -> bool {
        if self.stall {
            return false;
        }
        if self.ack_clock_stop {
            self.regs.cccr.modify(|r: &mut Cccr| {
                if r.csr() {
                    r.set_csa(true);
                }
            });
        }
        (0..timeout).any(|_| condition())
    }
}
