//! MPT cache (MPTC) diagnostics
//!
//! The MPTC is a set/way cache of recently used MPT entries. It can only be
//! inspected one entry at a time through the READ_MPTC select register.

use core::fmt;

use super::handler::FaultSink;
use super::regs::{RegisterIo, MPTC_MAX_WAYS};
use super::S2mpu;

/// Snapshot of one MPTC entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MptcEntry {
    pub set: u32,
    pub way: u32,
    /// Entry holds a cached translation
    pub valid: bool,
    /// VID the entry belongs to
    pub vid: u32,
    /// Granularity code of the cached entry
    pub gran: u32,
    /// Physical page number tag
    pub ppn: u32,
    /// Raw TAG_OTHERS word
    pub others: u32,
    /// Cached permission data
    pub data: u32,
}

impl fmt::Display for MptcEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MPTC[set={}, way={}] VID={} PPN={:#x} OTHERS={:#010x} DATA={:#010x}",
            self.set, self.way, self.vid, self.ppn, self.others, self.data
        )
    }
}

/// Outcome of a full MPTC scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MptcSummary {
    /// Entries reported
    pub valid: u32,
    /// Entries skipped
    pub invalid: u32,
}

impl fmt::Display for MptcSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid entries: {}", self.invalid)
    }
}

impl<R: RegisterIo> S2mpu<R> {
    /// Report every valid MPTC entry and count the invalid ones
    ///
    /// Purely diagnostic; cache contents and fault state are left untouched.
    /// Ways past what READ_MPTC can select are skipped, and so is an entry
    /// that cannot be read. The summary is always reported.
    pub fn dump_mptc(&self, sink: &mut dyn FaultSink) -> MptcSummary {
        let geometry = self.regs().read_info();
        let mut summary = MptcSummary::default();

        let ways = geometry.ways.min(MPTC_MAX_WAYS);
        if ways < geometry.ways {
            log::warn!(
                "s2mpu: MPTC reports {} ways, only {} can be read",
                geometry.ways,
                MPTC_MAX_WAYS
            );
        }

        for set in 0..geometry.sets {
            for way in 0..ways {
                let entry = match self.regs().read_mptc(set, way) {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::error!("s2mpu: cannot read MPTC[set={}, way={}]: {}", set, way, err);
                        continue;
                    }
                };
                if !entry.valid {
                    summary.invalid += 1;
                    continue;
                }
                summary.valid += 1;
                sink.report_mptc_entry(&entry);
            }
        }

        sink.report_mptc_summary(&summary);
        summary
    }
}
