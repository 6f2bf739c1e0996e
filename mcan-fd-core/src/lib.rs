#![no_std]
#![warn(missing_docs)]

//! `mcan-fd-core` provides the thin integration layer between the platform
//! independent [`mcan-fd`] driver core and platform specific HAL crates (in
//! documentation also referred to as _target HALs_).
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by target HALs.
//!
//! Integrators of this crate into any given target HAL are responsible for
//! soundness of trait implementations and conforming to their respective safety
//! prerequisites.
//!
//! [`mcan-fd`]: <https://docs.rs/crate/mcan-fd/>

pub use fugit;

/// Trait representing CAN peripheral identity
///
/// Types implementing this trait are expected to be used as marker types that
/// identify a specific instance of the CAN peripheral available on the
/// platform (as there might be more than one). It only conveys *where* the
/// registers of the peripheral are located, not that they can be accessed.
/// The latter is expressed by the [`Dependencies`] trait.
///
/// An MCAN instance is addressed through two registers blocks: the core
/// register block of the controller itself and a chip configuration register
/// whose upper 16 bits hold the upper half of the message RAM address. The
/// controller only ever sees 16-bit offsets into message RAM.
///
/// # Safety
/// - `CanId::ADDRESS` points to the start of a valid MCAN register block
/// - `CanId::DMA_BASE_ADDRESS` points to the 32-bit chip configuration
///   register whose bits 31:16 select the message RAM window of the very same
///   instance
///
/// # Examples
/// ```no_run
/// use mcan_fd_core::CanId;
///
/// pub enum Can0 {}
///
/// unsafe impl CanId for Can0 {
///     const ADDRESS: *const () = 0x4003_0000 as *const _;
///     const DMA_BASE_ADDRESS: *const () = 0x4008_8110 as *const _;
/// }
/// ```
pub unsafe trait CanId {
    /// Static address of the register block controlling the CAN peripheral
    const ADDRESS: *const ();
    /// Static address of the register holding the upper 16 bits of the
    /// message RAM address
    const DMA_BASE_ADDRESS: *const ();
}

/// Trait representing CAN peripheral dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose all object representable dependencies of [`CanId`] and release
///   them upon destruction
/// - be constructible only when it is safe and sound to interact with CAN
///   peripheral (respective clocks and pins have been already configured)
/// - be a singleton (only a single instance of [`Dependencies`] for a specific
///   [`CanId`] must exist at the same time)
///
/// Apart from ownership, the trait is also the place where the driver core
/// reaches out to the platform: memory synchronization around message RAM
/// accesses and the bounded busy-wait used while the controller acknowledges
/// configuration requests.
///
/// # Safety
/// While [`Dependencies`] type instance exists
/// - CAN related clocks must not change
/// - CAN related pins modes must not change
/// - HW register must not be safely accessible by application developer and
///   accessed in other parts of the target HAL
/// - [`Dependencies::memory_barrier`] must make all preceding CPU writes to
///   message RAM visible to the controller and all controller writes visible
///   to subsequent CPU reads
///
/// # Example
/// ```no_run
/// use fugit::HertzU32;
/// use mcan_fd_core::{CanId, Dependencies};
///
/// pub enum Can0 {}
///
/// unsafe impl CanId for Can0 {
///     const ADDRESS: *const () = 0x4003_0000 as *const _;
///     const DMA_BASE_ADDRESS: *const () = 0x4008_8110 as *const _;
/// }
///
/// pub struct Can0Dependencies {
///     // Opaque token proving the peripheral clock is running
///     can_clock: HertzU32,
/// }
///
/// unsafe impl Dependencies<Can0> for Can0Dependencies {
///     fn can_clock(&self) -> HertzU32 {
///         self.can_clock
///     }
///
///     fn memory_barrier(&self) {
///         // Targets with a data cache clean and invalidate the message RAM
///         // region here, followed by a DSB.
///         core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
///     }
/// }
/// ```
pub unsafe trait Dependencies<Id: CanId> {
    /// Frequency of CAN specific asynchronous clock.
    ///
    /// MCAN uses separate asynchronous clock for signaling / sampling and as
    /// such it should have reasonably high precision. Time quanta of both
    /// nominal and data bit timings are derived from it.
    fn can_clock(&self) -> fugit::HertzU32;

    /// Orders the CPU's and the controller's view of message RAM.
    ///
    /// Called after a Tx element is written and before its transmission is
    /// requested, and after an Rx or Tx event element is read and before it
    /// is acknowledged.
    fn memory_barrier(&self) {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Polls `condition` until it holds, at most `timeout` times.
    ///
    /// Returns `false` if the budget was exhausted. The budget is an iteration
    /// count, not wall-clock time.
    fn wait_until(&self, mut condition: impl FnMut() -> bool, timeout: u32) -> bool {
        (0..timeout).any(|_| condition())
    }
}
