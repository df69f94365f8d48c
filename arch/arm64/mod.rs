//! ARM64 (AArch64) support
//!
//! The host reaches the hypervisor at EL2 through SMCCC-encoded `hvc` calls
//! in the vendor-specific hypervisor service range.

pub mod smccc;

#[cfg(target_arch = "aarch64")]
pub mod hvc;

#[cfg(target_arch = "aarch64")]
pub use hvc::HvcHypervisor;
