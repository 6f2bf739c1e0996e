//! Register block of the controller and bit field views of its registers

use bitfield::bitfield;
use mcan_fd_core::CanId;
use vcell::VolatileCell;

/// Memory layout of the MCAN register block
#[repr(C)]
pub struct RegisterBlock {
    /// 0x00 - Core Release
    pub crel: VolatileCell<u32>,
    /// 0x04 - Endian
    pub endn: VolatileCell<u32>,
    /// 0x08 - Customer
    pub cust: VolatileCell<u32>,
    /// 0x0c - Data Bit Timing and Prescaler
    pub dbtp: VolatileCell<u32>,
    /// 0x10 - Test
    pub test: VolatileCell<u32>,
    /// 0x14 - RAM Watchdog
    pub rwd: VolatileCell<u32>,
    /// 0x18 - CC Control
    pub cccr: VolatileCell<u32>,
    /// 0x1c - Nominal Bit Timing and Prescaler
    pub nbtp: VolatileCell<u32>,
    /// 0x20 - Timestamp Counter Configuration
    pub tscc: VolatileCell<u32>,
    /// 0x24 - Timestamp Counter Value
    pub tscv: VolatileCell<u32>,
    /// 0x28 - Timeout Counter Configuration
    pub tocc: VolatileCell<u32>,
    /// 0x2c - Timeout Counter Value
    pub tocv: VolatileCell<u32>,
    _reserved0: [VolatileCell<u32>; 4],
    /// 0x40 - Error Counter
    pub ecr: VolatileCell<u32>,
    /// 0x44 - Protocol Status
    pub psr: VolatileCell<u32>,
    /// 0x48 - Transmitter Delay Compensation
    pub tdcr: VolatileCell<u32>,
    _reserved1: [VolatileCell<u32>; 1],
    /// 0x50 - Interrupt
    pub ir: VolatileCell<u32>,
    /// 0x54 - Interrupt Enable
    pub ie: VolatileCell<u32>,
    /// 0x58 - Interrupt Line Select
    pub ils: VolatileCell<u32>,
    /// 0x5c - Interrupt Line Enable
    pub ile: VolatileCell<u32>,
    _reserved2: [VolatileCell<u32>; 8],
    /// 0x80 - Global Filter Configuration
    pub gfc: VolatileCell<u32>,
    /// 0x84 - Standard ID Filter Configuration
    pub sidfc: VolatileCell<u32>,
    /// 0x88 - Extended ID Filter Configuration
    pub xidfc: VolatileCell<u32>,
    _reserved3: [VolatileCell<u32>; 1],
    /// 0x90 - Extended ID AND Mask
    pub xidam: VolatileCell<u32>,
    /// 0x94 - High Priority Message Status
    pub hpms: VolatileCell<u32>,
    /// 0x98 - New Data 1
    pub ndat1: VolatileCell<u32>,
    /// 0x9c - New Data 2
    pub ndat2: VolatileCell<u32>,
    /// 0xa0 - Rx FIFO 0 Configuration
    pub rxf0c: VolatileCell<u32>,
    /// 0xa4 - Rx FIFO 0 Status
    pub rxf0s: VolatileCell<u32>,
    /// 0xa8 - Rx FIFO 0 Acknowledge
    pub rxf0a: VolatileCell<u32>,
    /// 0xac - Rx Buffer Configuration
    pub rxbc: VolatileCell<u32>,
    /// 0xb0 - Rx FIFO 1 Configuration
    pub rxf1c: VolatileCell<u32>,
    /// 0xb4 - Rx FIFO 1 Status
    pub rxf1s: VolatileCell<u32>,
    /// 0xb8 - Rx FIFO 1 Acknowledge
    pub rxf1a: VolatileCell<u32>,
    /// 0xbc - Rx Buffer / FIFO Element Size Configuration
    pub rxesc: VolatileCell<u32>,
    /// 0xc0 - Tx Buffer Configuration
    pub txbc: VolatileCell<u32>,
    /// 0xc4 - Tx FIFO/Queue Status
    pub txfqs: VolatileCell<u32>,
    /// 0xc8 - Tx Buffer Element Size Configuration
    pub txesc: VolatileCell<u32>,
    /// 0xcc - Tx Buffer Request Pending
    pub txbrp: VolatileCell<u32>,
    /// 0xd0 - Tx Buffer Add Request
    pub txbar: VolatileCell<u32>,
    /// 0xd4 - Tx Buffer Cancellation Request
    pub txbcr: VolatileCell<u32>,
    /// 0xd8 - Tx Buffer Transmission Occurred
    pub txbto: VolatileCell<u32>,
    /// 0xdc - Tx Buffer Cancellation Finished
    pub txbcf: VolatileCell<u32>,
    /// 0xe0 - Tx Buffer Transmission Interrupt Enable
    pub txbtie: VolatileCell<u32>,
    /// 0xe4 - Tx Buffer Cancellation Finished Interrupt Enable
    pub txbcie: VolatileCell<u32>,
    _reserved4: [VolatileCell<u32>; 2],
    /// 0xf0 - Tx Event FIFO Configuration
    pub txefc: VolatileCell<u32>,
    /// 0xf4 - Tx Event FIFO Status
    pub txefs: VolatileCell<u32>,
    /// 0xf8 - Tx Event FIFO Acknowledge
    pub txefa: VolatileCell<u32>,
}

/// Location of the registers of one controller instance
///
/// Besides the core register block, the controller depends on a chip
/// configuration register providing the upper 16 bits of the message RAM
/// address.
#[derive(Copy, Clone)]
pub struct Registers {
    block: *const RegisterBlock,
    dma_base: *const VolatileCell<u32>,
}

// Safety: A `Registers` value only ever reaches the controller through the
// handle owning it, which requires `&mut self` for every write.
unsafe impl Send for Registers {}

impl Registers {
    /// Registers of the instance identified by `Id`
    pub fn of<Id: CanId>() -> Self {
        Self {
            block: Id::ADDRESS.cast(),
            dma_base: Id::DMA_BASE_ADDRESS.cast(),
        }
    }

    /// Registers located at arbitrary addresses
    ///
    /// # Safety
    /// `block` must point to a valid register block and `dma_base` to the
    /// matching message RAM base register, both alive and not accessed by
    /// anything else for as long as the returned value is used.
    pub unsafe fn from_raw(block: *const RegisterBlock, dma_base: *const VolatileCell<u32>) -> Self {
        Self { block, dma_base }
    }

    pub(crate) fn block(&self) -> &RegisterBlock {
        // Safety: Guaranteed by `CanId` or by the caller of `from_raw`.
        unsafe { &*self.block }
    }

    pub(crate) fn dma_base(&self) -> &VolatileCell<u32> {
        // Safety: Guaranteed by `CanId` or by the caller of `from_raw`.
        unsafe { &*self.dma_base }
    }
}

/// Typed read/write access to a 32-bit register through its bit field view
pub(crate) trait Access {
    fn read<R: From<u32>>(&self) -> R;
    fn write<R: Into<u32>>(&self, value: R);
    fn modify<R: From<u32> + Into<u32>>(&self, f: impl FnOnce(&mut R));
}

impl Access for VolatileCell<u32> {
    fn read<R: From<u32>>(&self) -> R {
        R::from(self.get())
    }

    fn write<R: Into<u32>>(&self, value: R) {
        self.set(value.into())
    }

    fn modify<R: From<u32> + Into<u32>>(&self, f: impl FnOnce(&mut R)) {
        let mut value = R::from(self.get());
        f(&mut value);
        self.set(value.into())
    }
}

macro_rules! raw_conversions {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<u32> for $name {
                fn from(raw: u32) -> Self {
                    Self(raw)
                }
            }

            impl From<$name> for u32 {
                fn from(value: $name) -> Self {
                    value.0
                }
            }
        )*
    };
}

raw_conversions!(
    Cccr, Test, Rwd, Nbtp, Dbtp, Tdcr, Tscc, Tocc, Ecr, Psr, Ile, Gfc, Sidfc, Xidfc, Rxfc,
    Rxfs, Rxbc, Rxesc, Txbc, Txfqs, Txesc, Txefc, Txefs, DmaBase,
);

bitfield! {
    /// CC Control
    #[derive(Copy, Clone, Default)]
    pub struct Cccr(u32);
    impl Debug;
    /// Initialization
    pub init, set_init: 0;
    /// Configuration Change Enable
    pub cce, set_cce: 1;
    /// Restricted Operation Mode
    pub asm, set_asm: 2;
    /// Clock Stop Acknowledge
    pub csa, set_csa: 3;
    /// Clock Stop Request
    pub csr, set_csr: 4;
    /// Bus Monitoring Mode
    pub mon, set_mon: 5;
    /// Disable Automatic Retransmission
    pub dar, set_dar: 6;
    /// Test Mode Enable
    pub test, set_test: 7;
    /// FD Operation Enable
    pub fdoe, set_fdoe: 8;
    /// Bit Rate Switching Enable
    pub brse, set_brse: 9;
}

bitfield! {
    /// Test
    #[derive(Copy, Clone, Default)]
    pub struct Test(u32);
    impl Debug;
    /// Loop Back Mode
    pub lbck, set_lbck: 4;
}

bitfield! {
    /// RAM Watchdog
    #[derive(Copy, Clone, Default)]
    pub struct Rwd(u32);
    impl Debug;
    /// Watchdog Configuration
    pub u8, wdc, set_wdc: 7, 0;
    /// Watchdog Value
    pub u8, wdv, _: 15, 8;
}

bitfield! {
    /// Nominal Bit Timing and Prescaler
    #[derive(Copy, Clone, Default)]
    pub struct Nbtp(u32);
    impl Debug;
    /// Nominal Time Segment After Sample Point
    pub u8, ntseg2, set_ntseg2: 6, 0;
    /// Nominal Time Segment Before Sample Point
    pub u8, ntseg1, set_ntseg1: 15, 8;
    /// Nominal Bit Rate Prescaler
    pub u16, nbrp, set_nbrp: 24, 16;
    /// Nominal (Re)Synchronization Jump Width
    pub u8, nsjw, set_nsjw: 31, 25;
}

bitfield! {
    /// Data Bit Timing and Prescaler
    #[derive(Copy, Clone, Default)]
    pub struct Dbtp(u32);
    impl Debug;
    /// Data (Re)Synchronization Jump Width
    pub u8, dsjw, set_dsjw: 3, 0;
    /// Data Time Segment After Sample Point
    pub u8, dtseg2, set_dtseg2: 7, 4;
    /// Data Time Segment Before Sample Point
    pub u8, dtseg1, set_dtseg1: 12, 8;
    /// Data Bit Rate Prescaler
    pub u8, dbrp, set_dbrp: 20, 16;
    /// Transmitter Delay Compensation
    pub tdc, set_tdc: 23;
}

bitfield! {
    /// Transmitter Delay Compensation
    #[derive(Copy, Clone, Default)]
    pub struct Tdcr(u32);
    impl Debug;
    /// Transmitter Delay Compensation Filter Length
    pub u8, tdcf, set_tdcf: 6, 0;
    /// Transmitter Delay Compensation Offset
    pub u8, tdco, set_tdco: 14, 8;
}

bitfield! {
    /// Timestamp Counter Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Tscc(u32);
    impl Debug;
    /// Timestamp Select
    pub u8, tss, set_tss: 1, 0;
    /// Timestamp Counter Prescaler
    pub u8, tcp, set_tcp: 19, 16;
}

bitfield! {
    /// Timeout Counter Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Tocc(u32);
    impl Debug;
    /// Enable Timeout Counter
    pub etoc, set_etoc: 0;
    /// Timeout Select
    pub u8, tos, set_tos: 2, 1;
    /// Timeout Period
    pub u16, top, set_top: 31, 16;
}

bitfield! {
    /// Error Counter
    #[derive(Copy, Clone, Default)]
    pub struct Ecr(u32);
    impl Debug;
    /// Transmit Error Counter
    pub u8, tec, _: 7, 0;
    /// Receive Error Counter
    pub u8, rec, _: 14, 8;
    /// Receive Error Passive
    pub rp, _: 15;
    /// CAN Error Logging
    pub u8, cel, _: 23, 16;
}

bitfield! {
    /// Protocol Status
    #[derive(Copy, Clone, Default)]
    pub struct Psr(u32);
    impl Debug;
    /// Last Error Code
    pub u8, lec, _: 2, 0;
    /// Activity
    pub u8, act, _: 4, 3;
    /// Error Passive
    pub ep, _: 5;
    /// Warning Status
    pub ew, _: 6;
    /// Bus_Off Status
    pub bo, _: 7;
    /// Data Phase Last Error Code
    pub u8, dlec, _: 10, 8;
    /// ESI Flag of Last Received CAN FD Message
    pub resi, _: 11;
    /// BRS Flag of Last Received CAN FD Message
    pub rbrs, _: 12;
    /// Received a CAN FD Message
    pub rfdf, _: 13;
    /// Protocol Exception Event
    pub pxe, _: 14;
    /// Transmitter Delay Compensation Value
    pub u8, tdcv, _: 22, 16;
}

bitfield! {
    /// Interrupt Line Enable
    #[derive(Copy, Clone, Default)]
    pub struct Ile(u32);
    impl Debug;
    /// Enable Interrupt Line 0
    pub eint0, set_eint0: 0;
    /// Enable Interrupt Line 1
    pub eint1, set_eint1: 1;
}

bitfield! {
    /// Global Filter Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Gfc(u32);
    impl Debug;
    /// Reject Remote Frames Extended
    pub rrfe, set_rrfe: 0;
    /// Reject Remote Frames Standard
    pub rrfs, set_rrfs: 1;
    /// Accept Non-matching Frames Extended
    pub u8, anfe, set_anfe: 3, 2;
    /// Accept Non-matching Frames Standard
    pub u8, anfs, set_anfs: 5, 4;
}

bitfield! {
    /// Standard ID Filter Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Sidfc(u32);
    impl Debug;
    /// Filter List Standard Start Address (byte address, word aligned)
    pub u16, flssa, set_flssa: 15, 0;
    /// List Size Standard
    pub u8, lss, set_lss: 23, 16;
}

bitfield! {
    /// Extended ID Filter Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Xidfc(u32);
    impl Debug;
    /// Filter List Extended Start Address (byte address, word aligned)
    pub u16, flesa, set_flesa: 15, 0;
    /// List Size Extended
    pub u8, lse, set_lse: 22, 16;
}

bitfield! {
    /// Rx FIFO n Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Rxfc(u32);
    impl Debug;
    /// Rx FIFO Start Address (byte address, word aligned)
    pub u16, fsa, set_fsa: 15, 0;
    /// Rx FIFO Size
    pub u8, fs, set_fs: 22, 16;
    /// Rx FIFO Watermark
    pub u8, fwm, set_fwm: 30, 24;
    /// FIFO Operation Mode
    pub fom, set_fom: 31;
}

bitfield! {
    /// Rx FIFO n Status
    #[derive(Copy, Clone, Default)]
    pub struct Rxfs(u32);
    impl Debug;
    /// Rx FIFO Fill Level
    pub u8, ffl, set_ffl: 6, 0;
    /// Rx FIFO Get Index
    pub u8, fgi, set_fgi: 13, 8;
    /// Rx FIFO Put Index
    pub u8, fpi, set_fpi: 21, 16;
    /// Rx FIFO Full
    pub ff, set_ff: 24;
    /// Rx FIFO Message Lost
    pub rfl, set_rfl: 25;
}

bitfield! {
    /// Rx Buffer Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Rxbc(u32);
    impl Debug;
    /// Rx Buffer Start Address (byte address, word aligned)
    pub u16, rbsa, set_rbsa: 15, 0;
}

bitfield! {
    /// Rx Buffer / FIFO Element Size Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Rxesc(u32);
    impl Debug;
    /// Rx FIFO 0 Data Field Size
    pub u8, f0ds, set_f0ds: 2, 0;
    /// Rx FIFO 1 Data Field Size
    pub u8, f1ds, set_f1ds: 6, 4;
    /// Rx Buffer Data Field Size
    pub u8, rbds, set_rbds: 10, 8;
}

bitfield! {
    /// Tx Buffer Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Txbc(u32);
    impl Debug;
    /// Tx Buffers Start Address (byte address, word aligned)
    pub u16, tbsa, set_tbsa: 15, 0;
    /// Number of Dedicated Transmit Buffers
    pub u8, ndtb, set_ndtb: 21, 16;
    /// Transmit FIFO/Queue Size
    pub u8, tfqs, set_tfqs: 29, 24;
    /// Tx FIFO/Queue Mode
    pub tfqm, set_tfqm: 30;
}

bitfield! {
    /// Tx FIFO/Queue Status
    #[derive(Copy, Clone, Default)]
    pub struct Txfqs(u32);
    impl Debug;
    /// Tx FIFO Free Level
    pub u8, tffl, set_tffl: 5, 0;
    /// Tx FIFO Get Index
    pub u8, tfgi, set_tfgi: 12, 8;
    /// Tx FIFO/Queue Put Index
    pub u8, tfqpi, set_tfqpi: 20, 16;
    /// Tx FIFO/Queue Full
    pub tfqf, set_tfqf: 21;
}

bitfield! {
    /// Tx Buffer Element Size Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Txesc(u32);
    impl Debug;
    /// Tx Buffer Data Field Size
    pub u8, tbds, set_tbds: 2, 0;
}

bitfield! {
    /// Tx Event FIFO Configuration
    #[derive(Copy, Clone, Default)]
    pub struct Txefc(u32);
    impl Debug;
    /// Event FIFO Start Address (byte address, word aligned)
    pub u16, efsa, set_efsa: 15, 0;
    /// Event FIFO Size
    pub u8, efs, set_efs: 21, 16;
    /// Event FIFO Watermark
    pub u8, efwm, set_efwm: 29, 24;
}

bitfield! {
    /// Tx Event FIFO Status
    #[derive(Copy, Clone, Default)]
    pub struct Txefs(u32);
    impl Debug;
    /// Event FIFO Fill Level
    pub u8, effl, set_effl: 5, 0;
    /// Event FIFO Get Index
    pub u8, efgi, set_efgi: 12, 8;
    /// Event FIFO Put Index
    pub u8, efpi, set_efpi: 20, 16;
    /// Event FIFO Full
    pub eff, set_eff: 24;
    /// Tx Event FIFO Element Lost
    pub tefl, set_tefl: 25;
}

bitfield! {
    /// Chip configuration register holding the message RAM window
    #[derive(Copy, Clone, Default)]
    pub struct DmaBase(u32);
    impl Debug;
    /// Upper 16 bits of the message RAM address
    pub u16, base, set_base: 31, 16;
}

/// Extended ID AND Mask with every ID bit set
pub(crate) const XIDAM_ALL: u32 = 0x1FFF_FFFF;
