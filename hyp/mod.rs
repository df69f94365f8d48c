//! Hypervisor boundary
//!
//! The hypervisor enforces the MPT from its own privilege level. The host can
//! only reach it through a handful of privileged calls, abstracted by
//! [`HypervisorCalls`] so the call mechanism stays out of the driver logic.

use core::fmt;

use crate::mm::{FrameNr, PhysAddr};

pub mod lifecycle;

/// Hypervisor call errors, carrying the raw return code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Sharing a host page with the hypervisor failed
    ShareFailed(i64),
    /// Revoking a share failed
    UnshareFailed(i64),
    /// The hypervisor-resident driver rejected the MPT
    DriverInitFailed(i64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShareFailed(code) => write!(f, "host_share_hyp failed ({})", code),
            Error::UnshareFailed(code) => write!(f, "host_unshare_hyp failed ({})", code),
            Error::DriverInitFailed(code) => write!(f, "iommu_driver_init failed ({})", code),
        }
    }
}

/// Privileged calls into the hypervisor
pub trait HypervisorCalls {
    /// Grant the hypervisor access to the host page `pfn`
    fn host_share_hyp(&self, pfn: FrameNr) -> Result<(), Error>;

    /// Revoke the access granted by [`HypervisorCalls::host_share_hyp`]
    fn host_unshare_hyp(&self, pfn: FrameNr) -> Result<(), Error>;

    /// Ask the hypervisor-resident driver identified by `token` to adopt the
    /// `size`-byte MPT descriptor at `desc`
    fn iommu_driver_init(&self, token: u64, desc: PhysAddr, size: usize) -> Result<(), Error>;
}

impl<H: HypervisorCalls + ?Sized> HypervisorCalls for &H {
    fn host_share_hyp(&self, pfn: FrameNr) -> Result<(), Error> {
        (**self).host_share_hyp(pfn)
    }

    fn host_unshare_hyp(&self, pfn: FrameNr) -> Result<(), Error> {
        (**self).host_unshare_hyp(pfn)
    }

    fn iommu_driver_init(&self, token: u64, desc: PhysAddr, size: usize) -> Result<(), Error> {
        (**self).iommu_driver_init(token, desc, size)
    }
}
