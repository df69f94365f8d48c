//! Host hypercalls over `hvc`

use super::smccc::{SmcccFunctionId, SmcccResult};
use crate::config::HvcFunctionIds;
use crate::hyp::{Error, HypervisorCalls};
use crate::mm::{FrameNr, PhysAddr};

/// Issue a fast 64-bit host hypercall
///
/// # Safety
///
/// Traps to EL2. `fid` must name a host hypercall and the arguments must be
/// what that call expects.
#[inline]
pub unsafe fn hvc_call(fid: SmcccFunctionId, a1: u64, a2: u64, a3: u64) -> SmcccResult {
    let x0: u64;
    let x1: u64;

    core::arch::asm!(
        "hvc #0",
        inlateout("x0") fid.raw() as u64 => x0,
        inlateout("x1") a1 => x1,
        inlateout("x2") a2 => _,
        inlateout("x3") a3 => _,
        clobber_abi("system")
    );

    SmcccResult::new(x0, x1)
}

/// [`HypervisorCalls`] backed by real `hvc` instructions
#[derive(Debug, Clone, Copy, Default)]
pub struct HvcHypervisor {
    ids: HvcFunctionIds,
}

impl HvcHypervisor {
    pub const fn new(ids: HvcFunctionIds) -> Self {
        Self { ids }
    }

    fn call(&self, fn_num: u16, a1: u64, a2: u64, a3: u64) -> Result<(), i64> {
        let fid = SmcccFunctionId::host_hvc(fn_num);
        // SAFETY: fid is a vendor-hyp host call from the configured table
        let res = unsafe { hvc_call(fid, a1, a2, a3) };
        res.status()
    }
}

impl HypervisorCalls for HvcHypervisor {
    fn host_share_hyp(&self, pfn: FrameNr) -> Result<(), Error> {
        self.call(self.ids.host_share_hyp, pfn, 0, 0)
            .map_err(Error::ShareFailed)
    }

    fn host_unshare_hyp(&self, pfn: FrameNr) -> Result<(), Error> {
        self.call(self.ids.host_unshare_hyp, pfn, 0, 0)
            .map_err(Error::UnshareFailed)
    }

    fn iommu_driver_init(&self, token: u64, desc: PhysAddr, size: usize) -> Result<(), Error> {
        self.call(self.ids.iommu_driver_init, token, desc, size as u64)
            .map_err(Error::DriverInitFailed)
    }
}
