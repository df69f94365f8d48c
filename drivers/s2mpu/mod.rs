//! S2MPU device driver
//!
//! One [`S2mpu`] wraps the register block of one stage-2 memory protection
//! unit. It programs the unit from an [`Mpt`], drains its fault interrupt and
//! dumps its cache for diagnostics.

pub mod fault;
pub mod handler;
pub mod mptc;
pub mod regs;

pub use fault::{Direction, FaultRecord, FaultType};
pub use handler::{FaultSink, IrqReturn, LogSink};
pub use mptc::{MptcEntry, MptcSummary};
pub use regs::{MmioRegion, RegisterIo, S2mpuRegs};

use crate::config::S2mpuConfig;
use crate::mm::mpt::{Fmpt, Mpt, MptUpdate};
use crate::mm::PhysAddr;
use crate::utils;
use crate::Result;

use regs::{Version, ALL_VIDS_BITMAP, L1ENTRY_ATTR_GRAN_4K, NR_VIDS};

/// One S2MPU instance
pub struct S2mpu<R: RegisterIo> {
    regs: S2mpuRegs<R>,
    config: S2mpuConfig,
}

impl<R: RegisterIo> S2mpu<R> {
    /// Bind to a register block
    pub fn new(io: R, config: S2mpuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            regs: S2mpuRegs::new(io),
            config,
        })
    }

    /// Register accessor
    pub fn regs(&self) -> &S2mpuRegs<R> {
        &self.regs
    }

    /// Device configuration
    pub fn config(&self) -> &S2mpuConfig {
        &self.config
    }

    /// IP version
    pub fn version(&self) -> Version {
        self.regs.read_version()
    }

    /// Program every granule of `mpt` for all VIDs and turn the unit on
    pub fn initialize(&mut self, mpt: &Mpt) -> Result<()> {
        let version = self.version();
        log::info!(
            "s2mpu: v{}.{} rev {}, programming {} granules",
            version.major,
            version.minor,
            version.rev,
            mpt.iter().count()
        );

        for (gb, fmpt) in mpt.iter().enumerate() {
            self.write_fmpt(gb, fmpt)?;
        }
        utils::wmb();
        self.regs.invalidate_all();
        self.regs.set_control_regs(ALL_VIDS_BITMAP);
        Ok(())
    }

    /// Program the granules of `[start, end)` changed by the last
    /// [`Mpt::prepare_range`] and drop their cached translations
    pub fn apply_range(&mut self, mpt: &Mpt, start: PhysAddr, end: PhysAddr) -> Result<()> {
        for gb in Mpt::gigabytes(start, end) {
            let Some(fmpt) = mpt.fmpt(gb) else {
                return Err(crate::Error::InvalidArgument);
            };
            if fmpt.flags().contains(MptUpdate::L1) {
                self.write_fmpt(gb, fmpt)?;
            }
        }
        // Table updates must be visible before the cache drops old entries
        utils::wmb();
        self.regs.invalidate_range(start, end);
        Ok(())
    }

    fn write_fmpt(&self, gb: usize, fmpt: &Fmpt) -> Result<()> {
        for vid in 0..NR_VIDS {
            if fmpt.gran_1g() {
                self.regs.write_l1_entry_1g(vid, gb, fmpt.prot())?;
            } else {
                self.regs
                    .write_l1_entry_l2(vid, gb, fmpt.smpt_phys(), L1ENTRY_ATTR_GRAN_4K)?;
            }
        }
        Ok(())
    }
}
