//! Configuration management
//!
//! Runtime settings for the S2MPU fault handler and the hypercall IDs used to
//! reach the hypervisor-resident driver.

use crate::{Error, Result};

/// Default bound on fault-status reads per interrupt
pub const DEFAULT_MAX_DRAIN_ITERATIONS: u32 = 256;

/// Per-device S2MPU configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S2mpuConfig {
    /// Dump the L1 entry of each faulting address and the MPTC after draining
    pub full_dump: bool,
    /// Upper bound on fault-status reads in a single interrupt. A device that
    /// keeps re-asserting faults is abandoned after this many iterations.
    pub max_drain_iterations: u32,
}

impl Default for S2mpuConfig {
    fn default() -> Self {
        Self {
            full_dump: cfg!(feature = "full_dump"),
            max_drain_iterations: DEFAULT_MAX_DRAIN_ITERATIONS,
        }
    }
}

impl S2mpuConfig {
    /// Enable or disable the full diagnostic dump
    pub fn with_full_dump(mut self, full_dump: bool) -> Self {
        self.full_dump = full_dump;
        self
    }

    /// Set the drain iteration bound
    pub fn with_max_drain_iterations(mut self, max: u32) -> Self {
        self.max_drain_iterations = max;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_drain_iterations == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

/// Host-to-hypervisor function numbers
///
/// These are assigned by the hypervisor build and differ between kernel
/// versions, so they are supplied by the platform rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HvcFunctionIds {
    /// Share one host page with the hypervisor
    pub host_share_hyp: u16,
    /// Revoke a previous share
    pub host_unshare_hyp: u16,
    /// Hand the MPT descriptor to the hypervisor-resident IOMMU driver
    pub iommu_driver_init: u16,
}

impl Default for HvcFunctionIds {
    fn default() -> Self {
        Self {
            host_share_hyp: 0x0d,
            host_unshare_hyp: 0x0e,
            iommu_driver_init: 0x18,
        }
    }
}
