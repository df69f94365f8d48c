//! Test doubles for the hardware and hypervisor boundaries

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::drivers::s2mpu::regs::{
    reg_ns_fault_info, reg_ns_fault_pa_high, reg_ns_fault_pa_low, FaultInfo, L1Entry, RegisterIo,
    REG_NS_FAULT_STATUS, REG_NS_INTERRUPT_CLEAR, REG_NS_READ_MPTC, REG_NS_READ_MPTC_DATA,
    REG_NS_READ_MPTC_TAG_OTHERS, REG_NS_READ_MPTC_TAG_PPN,
};
use crate::drivers::s2mpu::{FaultRecord, FaultSink, MptcEntry, MptcSummary};
use crate::hyp::{self, HypervisorCalls};
use crate::mm::{order_size, DmaPages, FrameNr, PageAllocator, PhysAddr, PAGE_SIZE};

/// Something observable at the allocator or hypervisor boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Alloc { phys: PhysAddr, order: u32 },
    Free { phys: PhysAddr, order: u32 },
    Share(FrameNr),
    Unshare(FrameNr),
    DriverInit { token: u64, desc: PhysAddr, size: usize },
}

/// Ordered event log shared between fakes
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

/// Register block backed by a map, with just enough device behavior for the
/// fault and MPTC paths
#[derive(Default)]
pub struct FakeRegisters {
    values: RefCell<HashMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
    mptc: RefCell<HashMap<(u32, u32), (u32, u32, u32)>>,
    sticky: Cell<u32>,
    on_clear: RefCell<Vec<(u32, u32, PhysAddr, FaultInfo)>>,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    pub fn get(&self, offset: usize) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Every value written to `offset`, oldest first
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(off, _)| *off == offset)
            .map(|(_, value)| *value)
            .collect()
    }

    /// Latch a fault for `vid`
    pub fn raise_fault(&self, vid: u32, pa: PhysAddr, info: FaultInfo) {
        self.set(reg_ns_fault_pa_high(vid), (pa >> 32) as u32);
        self.set(reg_ns_fault_pa_low(vid), pa as u32);
        self.set(reg_ns_fault_info(vid), info.raw());
        self.set_status_bits(1 << vid);
    }

    pub fn set_status_bits(&self, bits: u32) {
        let status = self.get(REG_NS_FAULT_STATUS);
        self.set(REG_NS_FAULT_STATUS, status | bits);
    }

    /// Clearing `vid` never deasserts it
    pub fn make_sticky(&self, vid: u32) {
        self.sticky.set(self.sticky.get() | 1 << vid);
    }

    /// Raise a fault for `vid` once `trigger` has been cleared
    pub fn raise_on_clear(&self, trigger: u32, vid: u32, pa: PhysAddr, info: FaultInfo) {
        self.on_clear.borrow_mut().push((trigger, vid, pa, info));
    }

    /// Populate one cache entry
    pub fn set_mptc(&self, set: u32, way: u32, ppn: u32, others: u32, data: u32) {
        self.mptc.borrow_mut().insert((set, way), (ppn, others, data));
    }

    fn clear_status(&self, bits: u32) {
        let status = self.get(REG_NS_FAULT_STATUS);
        self.set(REG_NS_FAULT_STATUS, status & !(bits & !self.sticky.get()));

        let pending: Vec<_> = {
            let mut on_clear = self.on_clear.borrow_mut();
            let (fire, keep): (Vec<_>, Vec<_>) = on_clear
                .drain(..)
                .partition(|&(trigger, ..)| bits & (1 << trigger) != 0);
            *on_clear = keep;
            fire
        };
        for (_, vid, pa, info) in pending {
            self.raise_fault(vid, pa, info);
        }
    }

    fn select_mptc(&self, select: u32) {
        let set = select & 0xffff;
        let way = (select >> 16) & 0x7;
        let (ppn, others, data) = self
            .mptc
            .borrow()
            .get(&(set, way))
            .copied()
            .unwrap_or_default();
        self.set(REG_NS_READ_MPTC_TAG_PPN, ppn);
        self.set(REG_NS_READ_MPTC_TAG_OTHERS, others);
        self.set(REG_NS_READ_MPTC_DATA, data);
    }
}

impl RegisterIo for FakeRegisters {
    fn read32(&self, offset: usize) -> u32 {
        self.get(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.writes.borrow_mut().push((offset, value));
        match offset {
            REG_NS_INTERRUPT_CLEAR => self.clear_status(value),
            REG_NS_READ_MPTC => {
                self.set(offset, value);
                self.select_mptc(value);
            }
            _ => self.set(offset, value),
        }
    }
}

#[derive(Default)]
struct AllocState {
    live: HashMap<PhysAddr, u32>,
    attempts: usize,
    successes: usize,
    fail_at: Option<usize>,
}

/// Zeroed page-aligned heap memory, with the host address doubling as the
/// physical address
#[derive(Default)]
pub struct FakeAllocator {
    state: Mutex<AllocState>,
    journal: Journal,
}

impl FakeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            state: Mutex::default(),
            journal,
        }
    }

    /// Fail the allocation attempt with this zero-based index, once
    pub fn fail_at(&self, attempt: usize) {
        let mut state = self.state.lock().unwrap();
        state.fail_at = Some(state.attempts + attempt);
    }

    /// Blocks currently allocated
    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Successful allocations so far
    pub fn total_allocs(&self) -> usize {
        self.state.lock().unwrap().successes
    }

    fn layout(order: u32) -> Layout {
        Layout::from_size_align(order_size(order), PAGE_SIZE as usize).unwrap()
    }
}

impl PageAllocator for FakeAllocator {
    fn alloc_pages(&self, order: u32) -> Option<DmaPages> {
        let mut state = self.state.lock().unwrap();
        let attempt = state.attempts;
        state.attempts += 1;
        if state.fail_at == Some(attempt) {
            state.fail_at = None;
            return None;
        }

        let virt = NonNull::new(unsafe { alloc_zeroed(Self::layout(order)) })?;
        let phys = virt.as_ptr() as PhysAddr;
        state.live.insert(phys, order);
        state.successes += 1;
        self.journal.record(Event::Alloc { phys, order });
        Some(unsafe { DmaPages::new(virt, phys, order) })
    }

    fn free_pages(&self, pages: DmaPages) {
        let mut state = self.state.lock().unwrap();
        let order = state
            .live
            .remove(&pages.phys())
            .expect("freeing pages that are not allocated");
        assert_eq!(order, pages.order());
        self.journal.record(Event::Free {
            phys: pages.phys(),
            order,
        });
        unsafe { dealloc(pages.as_ptr(), Self::layout(order)) };
    }
}

impl Drop for FakeAllocator {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else {
            return;
        };
        for (&phys, &order) in state.live.iter() {
            unsafe { dealloc(phys as *mut u8, Self::layout(order)) };
        }
    }
}

/// Hypervisor that journals every call and fails on demand with `-1`
#[derive(Default)]
pub struct RecordingHypervisor {
    journal: Journal,
    fail_share: AtomicBool,
    fail_unshare: AtomicBool,
    fail_driver_init: AtomicBool,
}

impl RecordingHypervisor {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn fail_share(&self, fail: bool) {
        self.fail_share.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unshare(&self, fail: bool) {
        self.fail_unshare.store(fail, Ordering::SeqCst);
    }

    pub fn fail_driver_init(&self, fail: bool) {
        self.fail_driver_init.store(fail, Ordering::SeqCst);
    }

    /// Successful shares so far
    pub fn share_count(&self) -> usize {
        self.journal
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Share(_)))
            .count()
    }
}

impl HypervisorCalls for RecordingHypervisor {
    fn host_share_hyp(&self, pfn: FrameNr) -> Result<(), hyp::Error> {
        if self.fail_share.load(Ordering::SeqCst) {
            return Err(hyp::Error::ShareFailed(-1));
        }
        self.journal.record(Event::Share(pfn));
        Ok(())
    }

    fn host_unshare_hyp(&self, pfn: FrameNr) -> Result<(), hyp::Error> {
        if self.fail_unshare.load(Ordering::SeqCst) {
            return Err(hyp::Error::UnshareFailed(-1));
        }
        self.journal.record(Event::Unshare(pfn));
        Ok(())
    }

    fn iommu_driver_init(&self, token: u64, desc: PhysAddr, size: usize) -> Result<(), hyp::Error> {
        if self.fail_driver_init.load(Ordering::SeqCst) {
            return Err(hyp::Error::DriverInitFailed(-1));
        }
        self.journal.record(Event::DriverInit { token, desc, size });
        Ok(())
    }
}

/// Sink that keeps every report
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub faults: Vec<FaultRecord>,
    pub l1_entries: Vec<(u32, usize, L1Entry)>,
    pub mptc_entries: Vec<MptcEntry>,
    pub mptc_summaries: Vec<MptcSummary>,
}

impl FaultSink for RecordingSink {
    fn report_fault(&mut self, record: &FaultRecord) {
        self.faults.push(*record);
    }

    fn report_l1_entry(&mut self, vid: u32, gb: usize, entry: &L1Entry) {
        self.l1_entries.push((vid, gb, *entry));
    }

    fn report_mptc_entry(&mut self, entry: &MptcEntry) {
        self.mptc_entries.push(*entry);
    }

    fn report_mptc_summary(&mut self, summary: &MptcSummary) {
        self.mptc_summaries.push(*summary);
    }
}
