//! Controller instances of the SAM V71/E70/S70 family
//!
//! Both instances share the register layout and differ only in where their
//! registers live. The upper half of the message RAM address comes from the
//! matrix chip configuration registers: CCFG_CAN0 for MCAN0, CCFG_SYSIO for
//! MCAN1.

use mcan_fd_core::CanId;

/// MCAN0
pub enum Mcan0 {}

// Safety: Register block and CCFG_CAN0 of MCAN0 as documented by the device
// datasheet.
unsafe impl CanId for Mcan0 {
    const ADDRESS: *const () = 0x4003_0000 as *const _;
    const DMA_BASE_ADDRESS: *const () = 0x4008_8110 as *const _;
}

/// MCAN1
pub enum Mcan1 {}

// Safety: Register block of MCAN1 and CCFG_SYSIO, which holds the CAN1DMABA
// field in its upper half.
unsafe impl CanId for Mcan1 {
    const ADDRESS: *const () = 0x4003_4000 as *const _;
    const DMA_BASE_ADDRESS: *const () = 0x4008_8114 as *const _;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instances_differ_only_in_address() {
        assert_eq!(Mcan0::ADDRESS as usize, 0x4003_0000);
        assert_eq!(Mcan1::ADDRESS as usize, 0x4003_4000);
        assert_eq!(Mcan0::DMA_BASE_ADDRESS as usize, 0x4008_8110);
        assert_eq!(Mcan1::DMA_BASE_ADDRESS as usize, 0x4008_8114);
    }
}
