//! s2mpu - Stage-2 Memory Protection Unit support for a protected hypervisor
//!
//! The S2MPU gates DMA-capable peripherals from reaching physical memory they
//! were not granted. This crate provides the host-side pieces around it:
//!
//! - [`mm::mpt`]: the memory protection table (MPT) descriptor store
//! - [`drivers::s2mpu`]: typed register access, fault decoding, the fault
//!   draining interrupt handler and MPTC diagnostics
//! - [`hyp`]: the hypercall seam and the one-time driver lifecycle that
//!   shares the MPT with the hypervisor
//! - [`arch`]: the `hvc` transport behind the hypercall seam on AArch64

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Core modules
pub mod utils;
pub mod config;

// Architecture-specific code
pub mod arch;

// Memory protection table and DMA pages
pub mod mm;

// Device drivers
pub mod drivers;

// Hypervisor boundary
pub mod hyp;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{HvcFunctionIds, S2mpuConfig};
pub use drivers::s2mpu::{FaultSink, IrqReturn, LogSink, S2mpu};
pub use hyp::lifecycle::S2mpuDriver;
pub use hyp::HypervisorCalls;
pub use mm::mpt::{Mpt, MptProt};
pub use mm::{DmaPages, PageAllocator};

#[cfg(all(feature = "arch_arm64", target_arch = "aarch64"))]
pub use arch::arm64::HvcHypervisor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common error type for the S2MPU crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument (VID, gigabyte index or address range out of bounds)
    InvalidArgument,
    /// DMA page allocation failed
    OutOfMemory,
    /// Driver has not been initialized
    NotInitialized,
    /// Hypervisor rejected a call
    Hypervisor(hyp::Error),
}

impl From<hyp::Error> for Error {
    fn from(err: hyp::Error) -> Self {
        Error::Hypervisor(err)
    }
}

impl ::core::fmt::Display for Error {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::NotInitialized => write!(f, "driver not initialized"),
            Error::Hypervisor(err) => write!(f, "hypervisor error: {}", err),
        }
    }
}

/// Result type alias
pub type Result<T> = ::core::result::Result<T, Error>;
