//! Device handle and the configuration sequence

use crate::config::{
    BitTiming, Config, FdConfig, FilterList, IdFilter, Mode, NonMatchingPolicy, RxBufferConfig,
    RxFifoConfig, RxFifoMode, Timeout, TimeoutKind, Timestamp, TimestampClock,
    TransmitterDelayCompensation, TxBufferConfig, TxEventFifoConfig, TxQueueMode,
};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::message::ElementSize;
use crate::messageram::{self, SharedMemory, WINDOW_SIZE};
use crate::reg::{
    Access as _, Cccr, Dbtp, DmaBase, Ecr, Gfc, Nbtp, Psr, RegisterBlock, Registers, Rwd, Rxbc,
    Rxesc, Rxfc, Sidfc, Tdcr, Test, Tocc, Tscc, Txbc, Txefc, Txesc, Xidfc, XIDAM_ALL,
};
use core::convert::TryFrom;
use core::fmt::{self, Debug};
use core::marker::PhantomData;
use fugit::HertzU32;
use mcan_fd_core::{CanId, Dependencies};
use vcell::VolatileCell;

/// Printable PSR field
pub struct ProtocolStatus(pub Psr);

impl From<Psr> for ProtocolStatus {
    fn from(value: Psr) -> Self {
        Self(value)
    }
}

impl Debug for ProtocolStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        let psr = &self.0;

        f.debug_struct("ProtocolStatus")
            .field("tdcv", &psr.tdcv())
            .field("pxe", &psr.pxe())
            .field("rfdf", &psr.rfdf())
            .field("rbrs", &psr.rbrs())
            .field("resi", &psr.resi())
            .field("dlec", &psr.dlec())
            .field("bo", &psr.bo())
            .field("ew", &psr.ew())
            .field("ep", &psr.ep())
            .field("act", &psr.act())
            .field("lec", &psr.lec())
            .finish()
    }
}

/// Printable ECR field
pub struct ErrorCounters(pub Ecr);

impl From<Ecr> for ErrorCounters {
    fn from(value: Ecr) -> Self {
        Self(value)
    }
}

impl Debug for ErrorCounters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> fmt::Result {
        let ecr = &self.0;

        f.debug_struct("ErrorCounters")
            .field("cel", &ecr.cel())
            .field("rec", &ecr.rec())
            .field("rp", &ecr.rp())
            .field("tec", &ecr.tec())
            .finish()
    }
}

/// Error that may occur during construction
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryNotAddressableError;

/// Handle of one controller and the message RAM it shares with the CPU
///
/// Every region is disabled until a configuration is applied with
/// [`Self::set_config`]. The handle assumes exclusive access to the registers
/// and the shared memory; sharing it between an interrupt handler and the main
/// context needs external synchronization.
pub struct Mcan<'a, Id, D> {
    registers: Registers,
    dependencies: D,
    memory: &'a [VolatileCell<u32>],
    layout: Layout,
    _id: PhantomData<Id>,
}

impl<'a, Id: CanId, D: Dependencies<Id>> Mcan<'a, Id, D> {
    /// Create a handle for the controller identified by `Id`.
    ///
    /// The hardware requires that `memory` lies within a single 64K window.
    /// If this condition is not fulfilled, an error is returned. The memory is
    /// zeroed.
    pub fn new<const N: usize>(
        dependencies: D,
        memory: &'a mut SharedMemory<N>,
    ) -> core::result::Result<Self, MemoryNotAddressableError> {
        // Safety: `dependencies` implies ownership of the registers identified
        // by `Id`.
        unsafe { Self::from_registers(Registers::of::<Id>(), dependencies, memory) }
    }

    /// Create a handle for a controller whose registers are not described by
    /// `Id`.
    ///
    /// # Safety
    /// Nothing else may access `registers` while the handle exists.
    pub unsafe fn from_registers<const N: usize>(
        registers: Registers,
        dependencies: D,
        memory: &'a mut SharedMemory<N>,
    ) -> core::result::Result<Self, MemoryNotAddressableError> {
        if !memory.is_addressable() {
            return Err(MemoryNotAddressableError);
        }
        Ok(Self::from_parts(registers, dependencies, memory.init()))
    }

    pub(crate) fn from_parts(
        registers: Registers,
        dependencies: D,
        memory: &'a [VolatileCell<u32>],
    ) -> Self {
        Self {
            registers,
            dependencies,
            memory,
            layout: Layout::default(),
            _id: PhantomData,
        }
    }

    /// Give back the dependencies, ending the use of the controller
    pub fn release(self) -> D {
        self.dependencies
    }

    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &RegisterBlock {
        self.registers.block()
    }

    /// Raw access to the shared memory.
    ///
    /// # Safety
    /// Writes can corrupt elements the controller or the driver are using.
    pub unsafe fn message_ram(&self) -> &'a [VolatileCell<u32>] {
        self.memory
    }

    /// Start of the 64K window the controller addresses message RAM in
    pub fn message_ram_base(&self) -> usize {
        self.memory.as_ptr() as usize & !(WINDOW_SIZE - 1)
    }

    /// Region descriptors of the last applied configuration
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn regs(&self) -> &RegisterBlock {
        self.registers.block()
    }

    pub(crate) fn memory(&self) -> &'a [VolatileCell<u32>] {
        self.memory
    }

    pub(crate) fn dependencies(&self) -> &D {
        &self.dependencies
    }

    fn hw_address(&self, offset: u16) -> u16 {
        messageram::hw_address(self.memory, offset)
    }

    fn word_offset(&self, address: u16) -> u16 {
        messageram::word_offset(self.memory, address)
    }

    /// Applies `config`, leaving the controller in the configured mode
    ///
    /// `timeout` bounds every wait for the controller, counted in polls of
    /// [`Dependencies::wait_until`]. The configuration is validated before any
    /// register is touched. A timeout aborts the sequence without rolling
    /// back the steps already taken; the controller then stays in
    /// initialization.
    pub fn set_config(&mut self, config: &Config, timeout: u32) -> Result<()> {
        config.validate(self.memory.len())?;
        let registers = self.registers;
        let regs = registers.block();

        let base = (self.memory.as_ptr() as usize / WINDOW_SIZE) as u16;
        registers
            .dma_base()
            .modify(|r: &mut DmaBase| r.set_base(base));

        let mut cccr = Cccr(0);
        cccr.set_init(true);
        regs.cccr.write(cccr);
        if !self
            .dependencies
            .wait_until(|| regs.cccr.read::<Cccr>().init(), timeout)
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCAN: initialization request not acknowledged");
            return Err(Error::InitializationStartTimeout);
        }
        cccr.set_cce(true);
        regs.cccr.write(cccr);
        regs.gfc.set(0);

        self.apply_mode(config, timeout)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("MCAN: mode {}", config.mode);

        regs.nbtp.write(nbtp(&config.nominal_timing));
        if let Some(fd) = &config.fd {
            let mut dbtp = dbtp(&fd.data_timing);
            let mut tdcr = Tdcr(0);
            if let Some(tdc) = &fd.transmitter_delay_compensation {
                dbtp.set_tdc(true);
                tdcr.set_tdcf(tdc.filter);
                tdcr.set_tdco(tdc.offset);
            }
            regs.dbtp.write(dbtp);
            regs.tdcr.write(tdcr);
        }

        let mut tscc = Tscc(0);
        tscc.set_tss(config.timestamp.clock as u8);
        tscc.set_tcp(config.timestamp.prescaler);
        regs.tscc.write(tscc);
        regs.tscv.set(0);

        let mut tocc = Tocc(0);
        if let Some(timeout) = &config.timeout {
            tocc.set_etoc(true);
            tocc.set_tos(timeout.kind as u8);
            tocc.set_top(timeout.period);
        }
        regs.tocc.write(tocc);

        self.apply_filters(config);
        self.apply_regions(config);
        self.apply_interrupts(&config.interrupts);

        regs.rwd.modify(|r: &mut Rwd| r.set_wdc(config.ram_watchdog));
        regs.xidam.set(XIDAM_ALL);

        self.layout = Layout::from_config(config);

        // In power down the controller sets INIT again once the clock stops
        regs.cccr.modify(|r: &mut Cccr| {
            r.set_cce(false);
            r.set_init(false);
        });
        #[cfg(feature = "defmt")]
        defmt::debug!("MCAN: configuration applied");
        Ok(())
    }

    fn apply_mode(&mut self, config: &Config, timeout: u32) -> Result<()> {
        let regs = self.registers.block();
        let mut test = Test(0);
        regs.cccr.modify(|r: &mut Cccr| {
            r.set_fdoe(config.fd.is_some());
            r.set_brse(config.fd.map_or(false, |fd| fd.allow_bit_rate_switching));
            match config.mode {
                Mode::Normal => {}
                Mode::AutomaticRetransmissionDisabled => r.set_dar(true),
                Mode::Restricted => r.set_asm(true),
                Mode::BusMonitoring => r.set_mon(true),
                Mode::PowerDown => r.set_csr(true),
                Mode::InternalLoopBackTest => {
                    r.set_test(true);
                    r.set_mon(true);
                    test.set_lbck(true);
                }
                // Rejected by `Config::validate`
                Mode::Invalid => {}
            }
        });
        // TEST is writable only with CCCR.TEST set
        regs.test.write(test);

        if config.mode == Mode::PowerDown
            && !self
                .dependencies
                .wait_until(|| regs.cccr.read::<Cccr>().csa(), timeout)
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCAN: clock stop request not acknowledged");
            return Err(Error::ClockStopRequestTimeout);
        }
        Ok(())
    }

    fn apply_filters(&mut self, config: &Config) {
        let regs = self.registers.block();
        let mut gfc = Gfc(0);
        let mut sidfc = Sidfc(0);
        match config.standard_id_filter {
            IdFilter::RejectAll => {
                gfc.set_rrfs(true);
            }
            IdFilter::Filter { non_matching, list } => {
                gfc.set_anfs(non_matching as u8);
                sidfc.set_flssa(self.hw_address(list.offset));
                sidfc.set_lss(list.len);
            }
        }
        let mut xidfc = Xidfc(0);
        match config.extended_id_filter {
            IdFilter::RejectAll => {
                gfc.set_rrfe(true);
            }
            IdFilter::Filter { non_matching, list } => {
                gfc.set_anfe(non_matching as u8);
                xidfc.set_flesa(self.hw_address(list.offset));
                xidfc.set_lse(list.len);
            }
        }
        regs.gfc.write(gfc);
        regs.sidfc.write(sidfc);
        regs.xidfc.write(xidfc);
    }

    fn apply_regions(&mut self, config: &Config) {
        let regs = self.registers.block();
        let mut rxesc = Rxesc(0);

        let rx_fifo = |fifo: &Option<RxFifoConfig>| {
            let mut rxfc = Rxfc(0);
            if let Some(c) = fifo {
                rxfc.set_fsa(self.hw_address(c.offset));
                rxfc.set_fs(c.len);
                rxfc.set_fwm(c.watermark);
                rxfc.set_fom(c.mode == RxFifoMode::Overwrite);
            }
            rxfc
        };
        regs.rxf0c.write(rx_fifo(&config.rx_fifo_0));
        regs.rxf1c.write(rx_fifo(&config.rx_fifo_1));
        if let Some(c) = &config.rx_fifo_0 {
            rxesc.set_f0ds(c.element_size.bits());
        }
        if let Some(c) = &config.rx_fifo_1 {
            rxesc.set_f1ds(c.element_size.bits());
        }

        let mut rxbc = Rxbc(0);
        if let Some(c) = &config.rx_buffer {
            rxbc.set_rbsa(self.hw_address(c.offset));
            rxesc.set_rbds(c.element_size.bits());
        }
        regs.rxbc.write(rxbc);
        regs.rxesc.write(rxesc);

        let mut txbc = Txbc(0);
        let mut txesc = Txesc(0);
        if let Some(c) = &config.tx_buffer {
            txbc.set_tbsa(self.hw_address(c.offset));
            txbc.set_ndtb(c.buffer_len);
            txbc.set_tfqs(c.queue_len);
            txbc.set_tfqm(c.queue_mode == TxQueueMode::Priority);
            txesc.set_tbds(c.element_size.bits());
        }
        regs.txbc.write(txbc);
        regs.txesc.write(txesc);

        let mut txefc = Txefc(0);
        if let Some(c) = &config.tx_event_fifo {
            txefc.set_efsa(self.hw_address(c.offset));
            txefc.set_efs(c.len);
            txefc.set_efwm(c.watermark);
        }
        regs.txefc.write(txefc);
    }

    /// Mode the controller is currently in
    ///
    /// Bit combinations no [`Mode`] produces are reported as
    /// [`Mode::Invalid`].
    pub fn mode(&self) -> Mode {
        let regs = self.regs();
        decode_mode(regs.cccr.read(), regs.test.read())
    }

    /// Reads the applied configuration back
    ///
    /// Which regions are enabled and the number of dedicated Rx buffers are
    /// taken from the layout; everything else from the registers.
    pub fn get_config(&self) -> Config {
        let regs = self.regs();
        let cccr: Cccr = regs.cccr.read();
        let tscc: Tscc = regs.tscc.read();
        let tocc: Tocc = regs.tocc.read();
        let gfc: Gfc = regs.gfc.read();
        let rxesc: Rxesc = regs.rxesc.read();
        let rwd: Rwd = regs.rwd.read();

        let fd = cccr.fdoe().then(|| {
            let dbtp: Dbtp = regs.dbtp.read();
            let tdcr: Tdcr = regs.tdcr.read();
            FdConfig {
                data_timing: self.data_timing(),
                allow_bit_rate_switching: cccr.brse(),
                transmitter_delay_compensation: dbtp.tdc().then(|| {
                    TransmitterDelayCompensation {
                        filter: tdcr.tdcf(),
                        offset: tdcr.tdco(),
                    }
                }),
            }
        });

        let standard_id_filter = if gfc.rrfs() {
            IdFilter::RejectAll
        } else {
            let sidfc: Sidfc = regs.sidfc.read();
            IdFilter::Filter {
                non_matching: NonMatchingPolicy::from_bits(gfc.anfs()),
                list: FilterList {
                    offset: self.word_offset(sidfc.flssa()),
                    len: sidfc.lss(),
                },
            }
        };
        let extended_id_filter = if gfc.rrfe() {
            IdFilter::RejectAll
        } else {
            let xidfc: Xidfc = regs.xidfc.read();
            IdFilter::Filter {
                non_matching: NonMatchingPolicy::from_bits(gfc.anfe()),
                list: FilterList {
                    offset: self.word_offset(xidfc.flesa()),
                    len: xidfc.lse(),
                },
            }
        };

        let rx_fifo = |rxfc: Rxfc, size: u8| RxFifoConfig {
            offset: self.word_offset(rxfc.fsa()),
            len: rxfc.fs(),
            watermark: rxfc.fwm(),
            mode: if rxfc.fom() {
                RxFifoMode::Overwrite
            } else {
                RxFifoMode::Blocking
            },
            element_size: element_size(size),
        };

        Config {
            mode: self.mode(),
            fd,
            nominal_timing: self.nominal_timing(),
            timestamp: Timestamp {
                clock: TimestampClock::from_bits(tscc.tss()),
                prescaler: tscc.tcp(),
            },
            timeout: tocc.etoc().then(|| Timeout {
                kind: TimeoutKind::from_bits(tocc.tos()),
                period: tocc.top(),
            }),
            standard_id_filter,
            extended_id_filter,
            rx_fifo_0: self
                .layout
                .rx_fifo_0
                .map(|_| rx_fifo(regs.rxf0c.read(), rxesc.f0ds())),
            rx_fifo_1: self
                .layout
                .rx_fifo_1
                .map(|_| rx_fifo(regs.rxf1c.read(), rxesc.f1ds())),
            rx_buffer: self.layout.rx_buffer.map(|region| {
                let rxbc: Rxbc = regs.rxbc.read();
                RxBufferConfig {
                    offset: self.word_offset(rxbc.rbsa()),
                    len: region.len,
                    element_size: element_size(rxesc.rbds()),
                }
            }),
            tx_buffer: self.layout.tx_buffer.map(|_| {
                let txbc: Txbc = regs.txbc.read();
                let txesc: Txesc = regs.txesc.read();
                TxBufferConfig {
                    offset: self.word_offset(txbc.tbsa()),
                    buffer_len: txbc.ndtb(),
                    queue_len: txbc.tfqs(),
                    queue_mode: if txbc.tfqm() {
                        TxQueueMode::Priority
                    } else {
                        TxQueueMode::Fifo
                    },
                    element_size: element_size(txesc.tbds()),
                }
            }),
            tx_event_fifo: self.layout.tx_event_fifo.map(|_| {
                let txefc: Txefc = regs.txefc.read();
                TxEventFifoConfig {
                    offset: self.word_offset(txefc.efsa()),
                    len: txefc.efs(),
                    watermark: txefc.efwm(),
                }
            }),
            interrupts: self.read_interrupts(),
            ram_watchdog: rwd.wdc(),
        }
    }

    fn nominal_timing(&self) -> BitTiming {
        let nbtp: Nbtp = self.regs().nbtp.read();
        BitTiming {
            prescaler: nbtp.nbrp(),
            sync_jump_width: nbtp.nsjw(),
            segment_before_sample_point: nbtp.ntseg1(),
            segment_after_sample_point: nbtp.ntseg2(),
        }
    }

    fn data_timing(&self) -> BitTiming {
        let dbtp: Dbtp = self.regs().dbtp.read();
        BitTiming {
            prescaler: dbtp.dbrp().into(),
            sync_jump_width: dbtp.dsjw(),
            segment_before_sample_point: dbtp.dtseg1(),
            segment_after_sample_point: dbtp.dtseg2(),
        }
    }

    /// Bit rate of the arbitration phase
    pub fn nominal_bit_rate(&self) -> HertzU32 {
        self.nominal_timing()
            .bit_rate(self.dependencies.can_clock())
    }

    /// Bit rate of the data phase of bit rate switched frames; `None` unless
    /// CAN FD is enabled
    pub fn data_bit_rate(&self) -> Option<HertzU32> {
        let cccr: Cccr = self.regs().cccr.read();
        cccr.fdoe()
            .then(|| self.data_timing().bit_rate(self.dependencies.can_clock()))
    }

    /// Read error counters
    pub fn error_counters(&self) -> ErrorCounters {
        self.regs().ecr.read::<Ecr>().into()
    }

    /// Read additional status information
    pub fn protocol_status(&self) -> ProtocolStatus {
        self.regs().psr.read::<Psr>().into()
    }

    /// Get current time
    pub fn timestamp_counter(&self) -> u16 {
        self.regs().tscv.get() as u16
    }

    /// Restarts the timeout counter from its configured period
    pub fn reset_timeout_counter(&mut self) {
        // Any write reloads the counter
        self.regs().tocv.set(0);
    }
}

fn nbtp(timing: &BitTiming) -> Nbtp {
    let mut nbtp = Nbtp(0);
    nbtp.set_nbrp(timing.prescaler);
    nbtp.set_nsjw(timing.sync_jump_width);
    nbtp.set_ntseg1(timing.segment_before_sample_point);
    nbtp.set_ntseg2(timing.segment_after_sample_point);
    nbtp
}

fn dbtp(timing: &BitTiming) -> Dbtp {
    let mut dbtp = Dbtp(0);
    dbtp.set_dbrp(timing.prescaler as u8);
    dbtp.set_dsjw(timing.sync_jump_width);
    dbtp.set_dtseg1(timing.segment_before_sample_point);
    dbtp.set_dtseg2(timing.segment_after_sample_point);
    dbtp
}

fn element_size(bits: u8) -> ElementSize {
    // Three bit fields always hold a valid size
    ElementSize::try_from(bits).unwrap_or_default()
}

fn decode_mode(cccr: Cccr, test: Test) -> Mode {
    if cccr.init() {
        return if cccr.csr() && cccr.csa() {
            Mode::PowerDown
        } else {
            Mode::Invalid
        };
    }
    if cccr.csr() || cccr.csa() {
        return Mode::Invalid;
    }
    match (cccr.test(), cccr.mon()) {
        (true, true) if test.lbck() => Mode::InternalLoopBackTest,
        (true, _) => Mode::Invalid,
        (false, true) => Mode::BusMonitoring,
        (false, false) if cccr.asm() => Mode::Restricted,
        (false, false) if cccr.dar() => Mode::AutomaticRetransmissionDisabled,
        (false, false) => Mode::Normal,
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use crate::interrupt::{Interrupt, InterruptLine};
    use crate::test_util::{Harness, TestDeps};

    fn full_config() -> Config {
        let mut config = Config::new(BitTiming {
            prescaler: 3,
            sync_jump_width: 2,
            segment_before_sample_point: 10,
            segment_after_sample_point: 3,
        });
        config.mode = Mode::Restricted;
        config.fd = Some(FdConfig {
            data_timing: BitTiming {
                prescaler: 1,
                sync_jump_width: 1,
                segment_before_sample_point: 6,
                segment_after_sample_point: 1,
            },
            allow_bit_rate_switching: true,
            transmitter_delay_compensation: Some(TransmitterDelayCompensation {
                filter: 4,
                offset: 11,
            }),
        });
        config.timestamp = Timestamp {
            clock: TimestampClock::Internal,
            prescaler: 7,
        };
        config.timeout = Some(Timeout {
            kind: TimeoutKind::RxFifo1,
            period: 0x1234,
        });
        config.standard_id_filter = IdFilter::Filter {
            non_matching: NonMatchingPolicy::RxFifo1,
            list: FilterList { offset: 0, len: 8 },
        };
        config.extended_id_filter = IdFilter::RejectAll;
        config.rx_fifo_0 = Some(RxFifoConfig {
            offset: 8,
            len: 4,
            watermark: 3,
            mode: RxFifoMode::Overwrite,
            element_size: ElementSize::Bytes64,
        });
        config.rx_buffer = Some(RxBufferConfig {
            offset: 80,
            len: 2,
            element_size: ElementSize::Bytes12,
        });
        config.tx_buffer = Some(TxBufferConfig {
            offset: 90,
            buffer_len: 2,
            queue_len: 3,
            queue_mode: TxQueueMode::Priority,
            element_size: ElementSize::Bytes32,
        });
        config.tx_event_fifo = Some(TxEventFifoConfig {
            offset: 140,
            len: 5,
            watermark: 2,
        });
        config.interrupts.enable(
            [Interrupt::RxFifo0NewMessage, Interrupt::BusOff]
                .into_iter()
                .collect(),
            InterruptLine::Line1,
        );
        config.ram_watchdog = 0x40;
        config
    }

    #[test]
    fn configuration_reads_back() {
        let h = Harness::new();
        let mut can = h.can();
        let config = full_config();
        assert_eq!(can.set_config(&config, 10), Ok(()));
        assert_eq!(can.get_config(), config);
        assert_eq!(h.regs.xidam.get(), XIDAM_ALL);
        assert_eq!(
            can.layout().rx_fifo_0.map(|r| r.stride),
            Some(ElementSize::Bytes64.element_words() as u8)
        );
    }

    #[test]
    fn registers_hold_hardware_encoding() {
        let h = Harness::new();
        let mut can = h.can();
        can.set_config(&full_config(), 10).unwrap();
        let regs = h.regs;
        // NSJW 2, NBRP 3, NTSEG1 10, NTSEG2 3
        assert_eq!(regs.nbtp.get(), 2 << 25 | 3 << 16 | 10 << 8 | 3);
        assert_eq!(regs.dbtp.get(), 1 << 23 | 1 << 16 | 6 << 8 | 1 << 4 | 1);
        assert_eq!(regs.tdcr.get(), 11 << 8 | 4);
        // ASM, FDOE and BRSE with INIT released
        assert_eq!(regs.cccr.get(), 1 << 9 | 1 << 8 | 1 << 2);
        // Remote extended frames rejected, non-matching standard frames to
        // FIFO 1, non-matching extended frames left at FIFO 0
        assert_eq!(regs.gfc.get(), 1 << 4 | 1);
        assert_eq!(regs.tocc.get(), 0x1234 << 16 | 3 << 1 | 1);
        assert_eq!(regs.tscc.get(), 7 << 16 | 1);
        let base = h.memory.as_ptr() as usize as u32 & 0xffff;
        assert_eq!(regs.rxf0c.get(), 1 << 31 | 3 << 24 | 4 << 16 | (base + 8 * 4));
        assert_eq!(regs.rxesc.get(), 1 << 8 | 7);
        assert_eq!(regs.txbc.get(), 1 << 30 | 3 << 24 | 2 << 16 | (base + 90 * 4));
        assert_eq!(regs.txesc.get(), 5);
        assert_eq!(h.dma_base.get() >> 16, (h.memory.as_ptr() as usize >> 16) as u32 & 0xffff);
    }

    #[test]
    fn invalid_mode_touches_nothing() {
        let h = Harness::new();
        let mut can = h.can();
        let mut config = full_config();
        config.mode = Mode::Invalid;
        assert_eq!(can.set_config(&config, 10), Err(Error::ModeInvalid));
        assert_eq!(h.regs.cccr.get(), 0);
        assert_eq!(h.regs.nbtp.get(), 0);
        assert_eq!(h.dma_base.get(), 0);
    }

    #[test]
    fn init_request_can_time_out() {
        let h = Harness::new();
        let mut can = h.can_with(TestDeps {
            stall: true,
            ..h.deps()
        });
        assert_eq!(
            can.set_config(&full_config(), 10),
            Err(Error::InitializationStartTimeout)
        );
        // Nothing past the init request was written
        assert_eq!(h.regs.nbtp.get(), 0);
        assert_eq!(can.layout(), &Layout::default());
    }

    #[test]
    fn power_down_waits_for_clock_stop() {
        let h = Harness::new();
        let mut can = h.can_with(TestDeps {
            ack_clock_stop: true,
            ..h.deps()
        });
        let mut config = full_config();
        config.mode = Mode::PowerDown;
        assert_eq!(can.set_config(&config, 10), Ok(()));
        let cccr: Cccr = h.regs.cccr.read();
        assert!(cccr.csr() && cccr.csa());
        assert!(!cccr.init() && !cccr.cce());
        // Not a state the controller stays in
        assert_eq!(can.mode(), Mode::Invalid);
        // The controller re-enters initialization once the clock has stopped
        h.regs.cccr.modify(|r: &mut Cccr| r.set_init(true));
        assert_eq!(can.mode(), Mode::PowerDown);
    }

    #[test]
    fn reject_all_leaves_non_matching_policy_alone() {
        let h = Harness::new();
        let mut can = h.can();
        let mut config = Config::new(BitTiming::default());
        config.standard_id_filter = IdFilter::RejectAll;
        can.set_config(&config, 10).unwrap();
        let gfc: Gfc = h.regs.gfc.read();
        assert!(gfc.rrfs() && !gfc.rrfe());
        assert_eq!(gfc.anfs(), 0);
        assert_eq!(h.regs.sidfc.get(), 0);
        assert_eq!(can.get_config().standard_id_filter, IdFilter::RejectAll);
    }

    #[test]
    fn power_down_can_time_out() {
        let h = Harness::new();
        let mut can = h.can();
        let mut config = full_config();
        config.mode = Mode::PowerDown;
        assert_eq!(
            can.set_config(&config, 10),
            Err(Error::ClockStopRequestTimeout)
        );
    }

    #[test]
    fn every_mode_reads_back() {
        let h = Harness::new();
        let mut can = h.can();
        let mut config = Config::new(BitTiming::default());
        for mode in [
            Mode::Normal,
            Mode::AutomaticRetransmissionDisabled,
            Mode::Restricted,
            Mode::BusMonitoring,
            Mode::InternalLoopBackTest,
        ] {
            config.mode = mode;
            can.set_config(&config, 10).unwrap();
            assert_eq!(can.mode(), mode);
        }
    }

    #[test]
    fn unknown_bit_combinations_are_invalid() {
        let mut cccr = Cccr(0);
        cccr.set_init(true);
        assert_eq!(decode_mode(cccr, Test(0)), Mode::Invalid);
        let mut cccr = Cccr(0);
        cccr.set_test(true);
        assert_eq!(decode_mode(cccr, Test(0)), Mode::Invalid);
        cccr.set_mon(true);
        assert_eq!(decode_mode(cccr, Test(0)), Mode::Invalid);
        let mut cccr = Cccr(0);
        cccr.set_csa(true);
        assert_eq!(decode_mode(cccr, Test(0)), Mode::Invalid);
    }

    #[test]
    fn bit_rates_use_can_clock() {
        let h = Harness::new();
        let mut can = h.can();
        can.set_config(&full_config(), 10).unwrap();
        // 32 MHz / (4 * 16)
        assert_eq!(can.nominal_bit_rate(), HertzU32::kHz(500));
        // 32 MHz / (2 * 10)
        assert_eq!(can.data_bit_rate(), Some(HertzU32::kHz(1600)));
    }

    #[test]
    fn memory_outside_one_window_is_refused() {
        let h = Harness::new();
        // Larger than a whole window
        let memory = std::boxed::Box::leak(std::boxed::Box::new(
            SharedMemory::<{ WINDOW_SIZE / 4 + 1 }>::new(),
        ));
        let result = unsafe {
            Mcan::<crate::test_util::TestCan, _>::from_registers(h.registers(), h.deps(), memory)
        };
        assert!(result.is_err());
    }
}
