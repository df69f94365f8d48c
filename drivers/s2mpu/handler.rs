//! S2MPU fault interrupt handler
//!
//! Drains every pending per-VID fault: read the fault status, take the lowest
//! pending VID, decode and report it, clear it, and read the status again
//! until it comes back empty. VIDs are handled in ascending index order since
//! the hardware does not expose arrival order.

use super::fault::{decode_granularity, decode_protection, FaultRecord};
use super::mptc::{MptcEntry, MptcSummary};
use super::regs::{L1Entry, RegisterIo, ALL_VIDS_BITMAP};
use super::S2mpu;
use crate::mm::mpt::NR_GIGABYTES;
use crate::mm::SZ_1G;
use crate::Result;

/// Interrupt handler result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// No fault was pending, the interrupt was spurious
    None,
    /// At least one fault was handled
    Handled,
}

/// Destination of fault reports and cache dumps
pub trait FaultSink {
    /// One decoded fault
    fn report_fault(&mut self, record: &FaultRecord);

    /// L1 entry covering a faulting address
    fn report_l1_entry(&mut self, _vid: u32, _gb: usize, _entry: &L1Entry) {}

    /// One valid MPTC entry
    fn report_mptc_entry(&mut self, _entry: &MptcEntry) {}

    /// End of an MPTC scan
    fn report_mptc_summary(&mut self, _summary: &MptcSummary) {}
}

/// Sink writing reports to the kernel log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl FaultSink for LogSink {
    fn report_fault(&mut self, record: &FaultRecord) {
        log::error!("{}", record);
    }

    fn report_l1_entry(&mut self, vid: u32, gb: usize, entry: &L1Entry) {
        log::error!(
            "  L1ENTRY[vid={}, gb={}] ATTR={:#010x} gran={} prot={} L2TABLE_ADDR={:#x}",
            vid,
            gb,
            entry.attr.raw(),
            decode_granularity(entry.attr),
            decode_protection(entry.attr),
            entry.l2table_pa()
        );
    }

    fn report_mptc_entry(&mut self, entry: &MptcEntry) {
        log::error!("  {}", entry);
    }

    fn report_mptc_summary(&mut self, summary: &MptcSummary) {
        log::error!("  {}", summary);
    }
}

impl<R: RegisterIo> S2mpu<R> {
    /// Handle the fault interrupt
    ///
    /// Runs until a fresh status read shows no pending fault, so faults raised
    /// while the handler runs are drained as well. A device that never stops
    /// asserting is given up on after `max_drain_iterations` status reads.
    pub fn handle_irq(&mut self, sink: &mut dyn FaultSink) -> IrqReturn {
        let mut ret = IrqReturn::None;
        let mut warned_stray = false;
        let mut iterations = 0;

        loop {
            let status = self.regs().read_fault_status();
            if status.is_empty() {
                break;
            }
            if iterations == self.config().max_drain_iterations {
                log::error!(
                    "s2mpu: faults still pending after {} iterations, status {:?}",
                    iterations,
                    status
                );
                break;
            }
            iterations += 1;
            ret = IrqReturn::Handled;

            let stray = status.without(ALL_VIDS_BITMAP);
            if !stray.is_empty() && !warned_stray {
                log::warn!("s2mpu: fault status has bits outside the VID range: {:?}", stray);
                warned_stray = true;
            }

            let Some(vid) = status.and(ALL_VIDS_BITMAP).find_first_set() else {
                // Nothing a VID can be read for; acknowledge and stop
                self.regs().clear_faults(stray);
                break;
            };

            if let Err(err) = self.handle_fault(vid, sink) {
                log::error!("s2mpu: failed to handle fault of VID {}: {}", vid, err);
                break;
            }
        }

        if ret == IrqReturn::Handled && self.config().full_dump {
            self.dump_mptc(sink);
        }
        ret
    }

    /// Decode, report and clear the fault of one VID
    fn handle_fault(&self, vid: u32, sink: &mut dyn FaultSink) -> Result<()> {
        let regs = self.regs();
        let pa = regs.read_fault_pa(vid)?;
        let info = regs.read_fault_info(vid)?;
        let record = FaultRecord::decode(vid, pa, info);

        if !record.vid_consistent() {
            log::warn!(
                "s2mpu: FAULT_INFO of VID {} reports VID {} ({:#010x})",
                vid,
                record.info_vid(),
                info.raw()
            );
        }
        sink.report_fault(&record);

        if self.config().full_dump {
            let gb = (pa / SZ_1G) as usize;
            if gb < NR_GIGABYTES {
                let entry = regs.read_l1_entry(vid, gb)?;
                sink.report_l1_entry(vid, gb, &entry);
            }
        }

        regs.clear_fault(vid)
    }
}
