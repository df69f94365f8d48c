//! S2MPU driver lifecycle
//!
//! The hypervisor-resident S2MPU driver needs one MPT shared by every S2MPU
//! in the system. [`S2mpuDriver::init`] builds it the first time any device
//! asks, hands it over, and turns every later call into a no-op.
//!
//! Order of operations on the first call:
//! 1. allocate the descriptor page and one SMPT buffer per granule
//! 2. write the granule descriptors into the descriptor page
//! 3. share the descriptor page with the hypervisor
//! 4. ask the hypervisor driver to adopt it
//!
//! Any failure undoes the earlier steps in reverse. A page that could not be
//! unshared is never freed.

use spin::Mutex;

use super::HypervisorCalls;
use crate::mm::mpt::{Mpt, MPT_DESC_SIZE};
use crate::mm::{DmaPages, PageAllocator, PhysAddr};
use crate::{Error, Result};

/// MPT state owned by the driver after a successful init
///
/// The descriptor page is shared with the hypervisor, so the host keeps only
/// read access to the table from here on.
struct SharedMpt {
    desc: DmaPages,
    mpt: Mpt,
}

/// Handle to the hypervisor-resident S2MPU driver
///
/// `init` holds a spin lock for the whole first initialization, across every
/// page allocation and both hypercalls. Concurrent callers busy-wait for that
/// long. Call it during device bring-up, never from a hot path.
pub struct S2mpuDriver<H: HypervisorCalls, A: PageAllocator> {
    hyp: H,
    alloc: A,
    state: Mutex<Option<SharedMpt>>,
}

impl<H: HypervisorCalls, A: PageAllocator> S2mpuDriver<H, A> {
    /// Create an uninitialized handle
    pub const fn new(hyp: H, alloc: A) -> Self {
        Self {
            hyp,
            alloc,
            state: Mutex::new(None),
        }
    }

    /// Initialize the hypervisor driver once
    ///
    /// Safe to call from several devices concurrently: exactly one caller
    /// does the work, the others wait and return `Ok`. After a failure the
    /// handle is left uninitialized and the next call tries again.
    pub fn init(&self, token: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Ok(());
        }

        let shared = self.init_driver(token)?;
        log::info!(
            "s2mpu: hypervisor driver initialized, MPT descriptor at {:#x}",
            shared.desc.phys()
        );
        *state = Some(shared);
        Ok(())
    }

    /// Driver has been initialized
    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Physical address of the shared descriptor page
    pub fn descriptor_phys(&self) -> Result<PhysAddr> {
        self.state
            .lock()
            .as_ref()
            .map(|shared| shared.desc.phys())
            .ok_or(Error::NotInitialized)
    }

    /// Read access to the shared MPT
    pub fn with_mpt<T>(&self, f: impl FnOnce(&Mpt) -> T) -> Result<T> {
        let state = self.state.lock();
        let shared = state.as_ref().ok_or(Error::NotInitialized)?;
        Ok(f(&shared.mpt))
    }

    fn init_driver(&self, token: u64) -> Result<SharedMpt> {
        let Some(mut desc) = self.alloc.alloc_pages(0) else {
            log::error!("s2mpu: cannot allocate MPT descriptor page");
            return Err(Error::OutOfMemory);
        };

        let mpt = match Mpt::new(&self.alloc) {
            Ok(mpt) => mpt,
            Err(err) => {
                self.alloc.free_pages(desc);
                return Err(err);
            }
        };

        mpt.write_descriptors(&mut desc);
        let pfn = desc.pfn();

        if let Err(err) = self.hyp.host_share_hyp(pfn) {
            log::error!("s2mpu: {}", err);
            self.release(desc, mpt);
            return Err(err.into());
        }

        if let Err(err) = self.hyp.iommu_driver_init(token, desc.phys(), MPT_DESC_SIZE) {
            log::error!("s2mpu: {}", err);
            if let Err(unshare_err) = self.hyp.host_unshare_hyp(pfn) {
                // Still reachable from the hypervisor, must not be reused
                log::error!("s2mpu: {}, leaking descriptor page {:#x}", unshare_err, desc.phys());
                mpt.release(&self.alloc);
                core::mem::forget(desc);
                return Err(err.into());
            }
            self.release(desc, mpt);
            return Err(err.into());
        }

        Ok(SharedMpt { desc, mpt })
    }

    fn release(&self, desc: DmaPages, mpt: Mpt) {
        mpt.release(&self.alloc);
        self.alloc.free_pages(desc);
    }
}
