#![no_std]
#![warn(missing_docs)]
//! # MCAN FD
//!
//! ## Overview
//! This crate provides a platform-agnostic driver core for the Bosch M_CAN
//! controller.
//!
//! It provides the following features:
//!
//! - classical CAN and CAN FD with bitrate switching support
//! - message RAM layout chosen at runtime and checked against the memory
//!   handed to the driver
//! - operation modes including bus monitoring, restricted operation, internal
//!   loop back and power down
//! - message transmission using dedicated buffers and a FIFO or priority
//!   queue, with optional Tx event records
//! - message reception using dedicated buffers and two FIFOs
//! - standard and extended ID filter lists
//! - interrupt enabling, line routing and read-and-clear status snapshots
//!
//! MCAN is embedded in the MCU like all other peripherals. The interface
//! between them includes a clock signal, two HW interrupt lines, a
//! memory-mapped register block, a chip configuration register selecting the
//! upper half of the message RAM address and a dedicated, shared RAM memory
//! region (referred to as Message RAM) that both CPU and MCAN can access and
//! share information through.
//!
//! For the MCAN abstractions to be considered operational, this interface has
//! to be properly configured. The latter is assured through the safety
//! requirements of [`mcan_fd_core`] traits which platform-specific HALs are
//! expected to implement.
//!
//! In order to use MCAN, one has to create an [`Mcan`] handle and apply a
//! [`Config`] to it. Its constructor requires an instance of an
//! [`Dependencies`] implementing struct and holds onto it until it's
//! [`released`]. Safety requirements of the `Dependencies` trait
//! guarantee a correct state of MCAN interfaces during its operation.
//!
//! ## Message RAM Configuration
//!
//! The MCAN uses 16-bit addressing internally. The upper 16 bits of the
//! message RAM address are written by the driver to the chip configuration
//! register named by [`CanId::DMA_BASE_ADDRESS`], so the whole
//! [`SharedMemory`] has to lie within a single 64K window. [`Mcan::new`]
//! refuses memory that does not.
//!
//! One can configure the Message RAM as follows
//! - specify a custom `MEMORY` entry in a linker script mapped to the valid RAM
//!   memory region
//! - introduce a custom, `.bss` like (`NOLOAD` property), section - eg. `.can`
//! - map the input section to the `MEMORY` entry
//! - use the `#[link_section]` attribute in a code to link a static variable to
//!   this memory region
//!
//! Example of a linker script
//! ```text
//! MEMORY
//! {
//!   FLASH : ORIGIN = 0x400000, LENGTH = 2M
//!   CAN : ORIGIN = 0x20400000, LENGTH = 64K
//!   RAM : ORIGIN = 0x20410000, LENGTH = 192K
//! }
//!
//! SECTIONS {
//!   .can (NOLOAD) :
//!   {
//!     *(.can .can.*);
//!   } > CAN
//! }
//! ```
//!
//! Regions are placed inside the shared memory with word offsets in the
//! [`Config`]. [`Config::validate`] checks that every enabled region fits; it
//! does not check that regions stay clear of each other.
//!
//! ## General usage example
//!
//! ```no_run
//! use mcan_fd::bus::Mcan;
//! use mcan_fd::config::{
//!     BitTiming, Config, FdConfig, FilterList, IdFilter, NonMatchingPolicy, RxFifoConfig,
//!     TxBufferConfig, TxEventFifoConfig,
//! };
//! use mcan_fd::embedded_can::StandardId;
//! use mcan_fd::filter::{Action, Filter};
//! use mcan_fd::interrupt::{Interrupt, InterruptLine};
//! use mcan_fd::message::{ElementSize, TxElement};
//! use mcan_fd::messageram::SharedMemory;
//! use mcan_fd::rx_fifo::RxFifo;
//! use mcan_fd::samv71::Mcan0;
//!
//! # struct Dependencies;
//! # unsafe impl mcan_fd::core::Dependencies<Mcan0> for Dependencies {
//! #     fn can_clock(&self) -> mcan_fd::core::fugit::HertzU32 {
//! #         mcan_fd::core::fugit::HertzU32::MHz(40)
//! #     }
//! # }
//! #[link_section = ".can"]
//! static mut MESSAGE_RAM: SharedMemory<1024> = SharedMemory::new();
//!
//! // Safety: The only reference to the memory ever taken.
//! let memory = unsafe { &mut *core::ptr::addr_of_mut!(MESSAGE_RAM) };
//! let mut can = Mcan::<Mcan0, _>::new(Dependencies, memory).unwrap();
//!
//! // 500 kbit/s nominal, 2 Mbit/s data phase at a 40 MHz CAN clock
//! let mut config = Config::new(BitTiming {
//!     prescaler: 0,
//!     sync_jump_width: 15,
//!     segment_before_sample_point: 62,
//!     segment_after_sample_point: 15,
//! });
//! config.fd = Some(FdConfig {
//!     data_timing: BitTiming {
//!         prescaler: 0,
//!         sync_jump_width: 3,
//!         segment_before_sample_point: 14,
//!         segment_after_sample_point: 3,
//!     },
//!     allow_bit_rate_switching: true,
//!     transmitter_delay_compensation: None,
//! });
//! config.standard_id_filter = IdFilter::Filter {
//!     non_matching: NonMatchingPolicy::Reject,
//!     list: FilterList { offset: 0, len: 8 },
//! };
//! config.rx_fifo_0 = Some(RxFifoConfig {
//!     offset: 8,
//!     len: 16,
//!     element_size: ElementSize::Bytes64,
//!     ..Default::default()
//! });
//! config.tx_buffer = Some(TxBufferConfig {
//!     offset: 296,
//!     buffer_len: 4,
//!     queue_len: 12,
//!     element_size: ElementSize::Bytes64,
//!     ..Default::default()
//! });
//! config.tx_event_fifo = Some(TxEventFifoConfig {
//!     offset: 584,
//!     len: 16,
//!     watermark: 0,
//! });
//! config.interrupts.enable(
//!     [Interrupt::RxFifo0NewMessage, Interrupt::RxFifo0MessageLost]
//!         .into_iter()
//!         .collect(),
//!     InterruptLine::Line0,
//! );
//! can.set_config(&config, 10_000).unwrap();
//!
//! // This filter will put all messages with a standard ID into RxFifo0
//! can.set_standard_id_filter(
//!     Filter::Classic {
//!         action: Action::StoreFifo0,
//!         filter: StandardId::ZERO,
//!         mask: StandardId::ZERO,
//!     },
//!     0,
//! )
//! .unwrap();
//!
//! let mut frame = TxElement::new(StandardId::new(0x123).unwrap(), &[1, 2, 3]);
//! frame.store_tx_event = true;
//! can.tx_queue_push(&frame).unwrap();
//!
//! if let Ok(frame) = can.rx_fifo_pull(RxFifo::Fifo0) {
//!     let _ = (frame.id, frame.data());
//! }
//! let status = can.get_interrupt_status();
//! let _ = status.rx_fifo_0_new_message;
//! ```
//!
//! ## Logging
//!
//! With the `defmt` feature enabled the configuration sequence logs its steps
//! at debug level and controller timeouts at warn level, and all plain data
//! types implement `defmt::Format`.
//!
//! [`Mcan`]: crate::bus::Mcan
//! [`Mcan::new`]: crate::bus::Mcan::new
//! [`Config`]: crate::config::Config
//! [`Config::validate`]: crate::config::Config::validate
//! [`released`]: crate::bus::Mcan::release
//! [`Dependencies`]: mcan_fd_core::Dependencies
//! [`CanId::DMA_BASE_ADDRESS`]: mcan_fd_core::CanId::DMA_BASE_ADDRESS
//! [`SharedMemory`]: crate::messageram::SharedMemory

pub mod bus;
pub mod config;
pub mod error;
pub mod filter;
pub mod interrupt;
pub mod layout;
pub mod message;
pub mod messageram;
pub mod reg;
pub mod rx_dedicated_buffers;
pub mod rx_fifo;
pub mod samv71;
pub mod tx_buffers;
pub mod tx_event_fifo;

#[cfg(test)]
mod test_util;

pub use embedded_can;
pub use mcan_fd_core as core;
