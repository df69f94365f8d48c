//! S2MPU register block
//!
//! Register offsets, bitfield layouts and a typed accessor over the
//! memory-mapped register block. The accessor goes through [`RegisterIo`] so
//! the same code drives real MMIO and an in-memory stand-in.

use core::cell::Cell;
use core::ptr::NonNull;

use tock_registers::{register_bitfields, LocalRegisterCopy};
use volatile::VolatilePtr;

use crate::mm::mpt::{MptProt, NR_GIGABYTES};
use crate::mm::{PhysAddr, PAGE_SHIFT};
use crate::utils::{self, Bitmap32};
use crate::{Error, Result};

use super::mptc::MptcEntry;

/// Number of virtual IDs
pub const NR_VIDS: u32 = 8;

/// Bitmap with every VID set
pub const ALL_VIDS_BITMAP: Bitmap32 = Bitmap32::first_n(NR_VIDS);

/// Size of the register block
pub const REG_BLOCK_SIZE: usize = 0x10000;

pub const REG_NS_CTRL0: usize = 0x0;
pub const REG_NS_INTERRUPT_ENABLE_PER_VID_SET: usize = 0x20;
pub const REG_NS_INTERRUPT_CLEAR: usize = 0x2c;
pub const REG_NS_VERSION: usize = 0x60;
pub const REG_NS_INFO: usize = 0x64;
pub const REG_NS_ALL_INVALIDATION: usize = 0x1000;
pub const REG_NS_RANGE_INVALIDATION: usize = 0x1020;
pub const REG_NS_RANGE_INVALIDATION_START_PPN: usize = 0x1024;
pub const REG_NS_RANGE_INVALIDATION_END_PPN: usize = 0x1028;
pub const REG_NS_FAULT_STATUS: usize = 0x2000;
pub const REG_NS_READ_MPTC: usize = 0x3000;
pub const REG_NS_READ_MPTC_TAG_PPN: usize = 0x3004;
pub const REG_NS_READ_MPTC_TAG_OTHERS: usize = 0x3008;
pub const REG_NS_READ_MPTC_DATA: usize = 0x3010;

pub const fn reg_ns_fault_pa_low(vid: u32) -> usize {
    0x2004 + vid as usize * 0x20
}

pub const fn reg_ns_fault_pa_high(vid: u32) -> usize {
    0x2008 + vid as usize * 0x20
}

pub const fn reg_ns_fault_info(vid: u32) -> usize {
    0x2010 + vid as usize * 0x20
}

pub const fn reg_ns_l1entry_l2table_addr(vid: u32, gb: usize) -> usize {
    0x4000 + vid as usize * 0x200 + gb * 0x8
}

pub const fn reg_ns_l1entry_attr(vid: u32, gb: usize) -> usize {
    0x4004 + vid as usize * 0x200 + gb * 0x8
}

/// Fault type codes in FAULT_INFO.TYPE
pub const FAULT_INFO_TYPE_MPTW: u32 = 0x1;
pub const FAULT_INFO_TYPE_AP: u32 = 0x2;
pub const FAULT_INFO_TYPE_CONTEXT: u32 = 0x4;

/// Ways addressable through READ_MPTC.WAY
pub const MPTC_MAX_WAYS: u32 = 1 << 3;

/// Granularity codes in L1ENTRY_ATTR.GRAN
pub const L1ENTRY_ATTR_GRAN_4K: u32 = 0x0;
pub const L1ENTRY_ATTR_GRAN_64K: u32 = 0x1;
pub const L1ENTRY_ATTR_GRAN_2M: u32 = 0x2;

register_bitfields![u32,
    pub CTRL0 [
        ENABLE OFFSET(0) NUMBITS(1) [],
        INTERRUPT_ENABLE OFFSET(1) NUMBITS(1) [],
        FAULT_RESP_TYPE_DECERR OFFSET(2) NUMBITS(1) []
    ],
    pub VERSION [
        REV OFFSET(0) NUMBITS(16) [],
        MINOR OFFSET(24) NUMBITS(4) [],
        MAJOR OFFSET(28) NUMBITS(4) []
    ],
    pub INFO [
        NUM_SET OFFSET(0) NUMBITS(16) [],
        NUM_WAY OFFSET(16) NUMBITS(4) []
    ],
    pub FAULT_INFO [
        AXI_ID OFFSET(0) NUMBITS(16) [],
        LEN OFFSET(16) NUMBITS(4) [],
        RW OFFSET(20) NUMBITS(1) [],
        TYPE OFFSET(21) NUMBITS(3) [],
        VID OFFSET(24) NUMBITS(3) []
    ],
    pub L1ENTRY_ATTR [
        L2TABLE_EN OFFSET(0) NUMBITS(1) [],
        PROT OFFSET(1) NUMBITS(2) [],
        GRAN OFFSET(4) NUMBITS(2) []
    ],
    pub READ_MPTC [
        SET OFFSET(0) NUMBITS(16) [],
        WAY OFFSET(16) NUMBITS(3) []
    ],
    pub MPTC_TAG_PPN [
        PPN OFFSET(0) NUMBITS(24) []
    ],
    pub MPTC_TAG_OTHERS [
        VALID OFFSET(0) NUMBITS(1) [],
        GRAN OFFSET(4) NUMBITS(2) [],
        VID OFFSET(8) NUMBITS(3) []
    ]
];

/// Raw 32-bit register access at byte offsets
pub trait RegisterIo {
    /// Read the register at `offset`
    fn read32(&self, offset: usize) -> u32;

    /// Write the register at `offset`
    fn write32(&self, offset: usize, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// A mapped MMIO register block
pub struct MmioRegion {
    base: NonNull<u32>,
    size: usize,
}

// Register accesses are single volatile loads and stores.
unsafe impl Send for MmioRegion {}

impl MmioRegion {
    /// Create a new MMIO region
    ///
    /// Fails unless `base` is word aligned and `size` covers the whole
    /// S2MPU register block.
    ///
    /// # Safety
    /// `base` must point to `size` bytes of mapped device memory that stays
    /// mapped for the lifetime of the region.
    pub unsafe fn new(base: NonNull<u8>, size: usize) -> Result<Self> {
        if size < REG_BLOCK_SIZE || base.as_ptr() as usize % 4 != 0 {
            log::error!(
                "s2mpu: MMIO region at {:p} ({:#x} bytes) does not cover the register block",
                base.as_ptr(),
                size
            );
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            base: base.cast(),
            size,
        })
    }

    fn reg(&self, offset: usize) -> Option<VolatilePtr<'_, u32>> {
        if offset % 4 != 0 || offset.checked_add(4)? > self.size {
            log::error!("s2mpu: MMIO offset {:#x} outside the {:#x}-byte region", offset, self.size);
            return None;
        }
        // SAFETY: in bounds of the mapping the caller of new() vouched for
        Some(unsafe { VolatilePtr::new(NonNull::new_unchecked(self.base.as_ptr().add(offset / 4))) })
    }
}

impl RegisterIo for MmioRegion {
    /// Out-of-range offsets read as zero
    fn read32(&self, offset: usize) -> u32 {
        self.reg(offset).map_or(0, |reg| reg.read())
    }

    /// Out-of-range offsets are dropped
    fn write32(&self, offset: usize, value: u32) {
        if let Some(reg) = self.reg(offset) {
            reg.write(value);
        }
    }
}

/// Decoded FAULT_INFO register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo(u32);

impl FaultInfo {
    /// Wrap a raw register value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Compose a register value
    pub fn build(vid: u32, type_code: u32, write: bool, len: u32, axi_id: u32) -> Self {
        let mut reg = LocalRegisterCopy::<u32, FAULT_INFO::Register>::new(0);
        reg.modify(
            FAULT_INFO::VID.val(vid)
                + FAULT_INFO::TYPE.val(type_code)
                + FAULT_INFO::RW.val(write as u32)
                + FAULT_INFO::LEN.val(len)
                + FAULT_INFO::AXI_ID.val(axi_id),
        );
        Self(reg.get())
    }

    fn reg(self) -> LocalRegisterCopy<u32, FAULT_INFO::Register> {
        LocalRegisterCopy::new(self.0)
    }

    /// Raw value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// VID the hardware recorded for this fault
    pub fn vid(self) -> u32 {
        self.reg().read(FAULT_INFO::VID)
    }

    /// Fault type code
    pub fn type_code(self) -> u32 {
        self.reg().read(FAULT_INFO::TYPE)
    }

    /// Faulting transaction was a write
    pub fn is_write(self) -> bool {
        self.reg().is_set(FAULT_INFO::RW)
    }

    /// Requested transfer length
    pub fn req_len(self) -> u32 {
        self.reg().read(FAULT_INFO::LEN)
    }

    /// Requester AXI ID
    pub fn axi_id(self) -> u32 {
        self.reg().read(FAULT_INFO::AXI_ID)
    }
}

/// L1ENTRY_ATTR register of one granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1EntryAttr(u32);

impl L1EntryAttr {
    /// Wrap a raw register value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Whole granule mapped with `prot`
    pub fn for_1g(prot: MptProt) -> Self {
        let mut reg = LocalRegisterCopy::<u32, L1ENTRY_ATTR::Register>::new(0);
        reg.modify(L1ENTRY_ATTR::PROT.val(prot.bits()));
        Self(reg.get())
    }

    /// Granule backed by an L2 table of the given granularity code
    pub fn for_l2(gran: u32) -> Self {
        let mut reg = LocalRegisterCopy::<u32, L1ENTRY_ATTR::Register>::new(0);
        reg.modify(L1ENTRY_ATTR::GRAN.val(gran) + L1ENTRY_ATTR::L2TABLE_EN::SET);
        Self(reg.get())
    }

    fn reg(self) -> LocalRegisterCopy<u32, L1ENTRY_ATTR::Register> {
        LocalRegisterCopy::new(self.0)
    }

    /// Raw value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Entry points to an L2 table
    pub fn l2table_enabled(self) -> bool {
        self.reg().is_set(L1ENTRY_ATTR::L2TABLE_EN)
    }

    /// Protection field
    pub fn prot_code(self) -> u32 {
        self.reg().read(L1ENTRY_ATTR::PROT)
    }

    /// Granularity field
    pub fn gran_code(self) -> u32 {
        self.reg().read(L1ENTRY_ATTR::GRAN)
    }
}

/// Encode an L2 table address for L1ENTRY_L2TABLE_ADDR
pub const fn l1entry_l2table_addr(pa: PhysAddr) -> u32 {
    (pa >> 4) as u32
}

/// Raw L1 entry of one granule of one VID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1Entry {
    /// Attribute word
    pub attr: L1EntryAttr,
    /// L2 table address word, meaningful when the L2 table is enabled
    pub l2table_addr: u32,
}

impl L1Entry {
    /// Physical address of the L2 table
    pub fn l2table_pa(&self) -> PhysAddr {
        (self.l2table_addr as PhysAddr) << 4
    }
}

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub rev: u32,
}

/// MPTC geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MptcGeometry {
    pub sets: u32,
    pub ways: u32,
}

/// Typed accessor over the S2MPU register block
pub struct S2mpuRegs<R: RegisterIo> {
    io: R,
    /// Fault status seen by the last `read_fault_status`
    last_status: Cell<Bitmap32>,
}

impl<R: RegisterIo> S2mpuRegs<R> {
    /// Wrap a register block
    pub fn new(io: R) -> Self {
        Self {
            io,
            last_status: Cell::new(Bitmap32::EMPTY),
        }
    }

    /// Underlying register block
    pub fn io(&self) -> &R {
        &self.io
    }

    fn check_vid(vid: u32) -> Result<()> {
        if vid >= NR_VIDS {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Bitmap of VIDs with a pending fault
    pub fn read_fault_status(&self) -> Bitmap32 {
        let status = Bitmap32::new(self.io.read32(REG_NS_FAULT_STATUS));
        self.last_status.set(status);
        status
    }

    /// Fault info word of `vid`
    ///
    /// `vid` should be pending in the last status read. Reading another VID
    /// is a driver bug; it is reported but the value is still returned.
    pub fn read_fault_info(&self, vid: u32) -> Result<FaultInfo> {
        Self::check_vid(vid)?;
        if !self.last_status.get().test(vid) {
            log::warn!(
                "s2mpu: reading fault info of VID {} not pending in {:?}",
                vid,
                self.last_status.get()
            );
        }
        Ok(FaultInfo::new(self.io.read32(reg_ns_fault_info(vid))))
    }

    /// Faulting physical address of `vid`, high half first
    pub fn read_fault_pa(&self, vid: u32) -> Result<PhysAddr> {
        Self::check_vid(vid)?;
        let high = self.io.read32(reg_ns_fault_pa_high(vid)) as u64;
        let low = self.io.read32(reg_ns_fault_pa_low(vid)) as u64;
        Ok(high << 32 | low)
    }

    /// L1 entry of granule `gb` in the table of `vid`
    pub fn read_l1_entry(&self, vid: u32, gb: usize) -> Result<L1Entry> {
        Self::check_vid(vid)?;
        if gb >= NR_GIGABYTES {
            return Err(Error::InvalidArgument);
        }
        Ok(L1Entry {
            attr: L1EntryAttr::new(self.io.read32(reg_ns_l1entry_attr(vid, gb))),
            l2table_addr: self.io.read32(reg_ns_l1entry_l2table_addr(vid, gb)),
        })
    }

    /// Acknowledge the fault of `vid`
    pub fn clear_fault(&self, vid: u32) -> Result<()> {
        Self::check_vid(vid)?;
        self.io.write32(REG_NS_INTERRUPT_CLEAR, Bitmap32::bit(vid).raw());
        Ok(())
    }

    /// Acknowledge every fault in `vids`, including bits past the VID range
    pub fn clear_faults(&self, vids: Bitmap32) {
        self.io.write32(REG_NS_INTERRUPT_CLEAR, vids.raw());
    }

    /// Read one MPTC entry
    ///
    /// Selects the entry, waits for the select to land, then reads the tag
    /// and data registers.
    pub fn read_mptc(&self, set: u32, way: u32) -> Result<MptcEntry> {
        if set > READ_MPTC::SET.mask || way > READ_MPTC::WAY.mask {
            return Err(Error::InvalidArgument);
        }
        let mut select = LocalRegisterCopy::<u32, READ_MPTC::Register>::new(0);
        select.modify(READ_MPTC::SET.val(set) + READ_MPTC::WAY.val(way));
        self.io.write32(REG_NS_READ_MPTC, select.get());
        utils::mb();

        let ppn = LocalRegisterCopy::<u32, MPTC_TAG_PPN::Register>::new(
            self.io.read32(REG_NS_READ_MPTC_TAG_PPN),
        );
        let others = LocalRegisterCopy::<u32, MPTC_TAG_OTHERS::Register>::new(
            self.io.read32(REG_NS_READ_MPTC_TAG_OTHERS),
        );
        let data = self.io.read32(REG_NS_READ_MPTC_DATA);

        Ok(MptcEntry {
            set,
            way,
            valid: others.is_set(MPTC_TAG_OTHERS::VALID),
            vid: others.read(MPTC_TAG_OTHERS::VID),
            gran: others.read(MPTC_TAG_OTHERS::GRAN),
            ppn: ppn.read(MPTC_TAG_PPN::PPN),
            others: others.get(),
            data,
        })
    }

    /// IP version
    pub fn read_version(&self) -> Version {
        let reg = LocalRegisterCopy::<u32, VERSION::Register>::new(self.io.read32(REG_NS_VERSION));
        Version {
            major: reg.read(VERSION::MAJOR),
            minor: reg.read(VERSION::MINOR),
            rev: reg.read(VERSION::REV),
        }
    }

    /// MPTC sets and ways
    pub fn read_info(&self) -> MptcGeometry {
        let reg = LocalRegisterCopy::<u32, INFO::Register>::new(self.io.read32(REG_NS_INFO));
        MptcGeometry {
            sets: reg.read(INFO::NUM_SET),
            ways: reg.read(INFO::NUM_WAY),
        }
    }

    /// Map granule `gb` of `vid` as a whole with `prot`
    pub fn write_l1_entry_1g(&self, vid: u32, gb: usize, prot: MptProt) -> Result<()> {
        Self::check_vid(vid)?;
        if gb >= NR_GIGABYTES {
            return Err(Error::InvalidArgument);
        }
        self.io.write32(reg_ns_l1entry_attr(vid, gb), L1EntryAttr::for_1g(prot).raw());
        Ok(())
    }

    /// Point granule `gb` of `vid` at the L2 table at `smpt`
    ///
    /// The table address lands before the attribute enables it.
    pub fn write_l1_entry_l2(&self, vid: u32, gb: usize, smpt: PhysAddr, gran: u32) -> Result<()> {
        Self::check_vid(vid)?;
        if gb >= NR_GIGABYTES {
            return Err(Error::InvalidArgument);
        }
        self.io.write32(reg_ns_l1entry_l2table_addr(vid, gb), l1entry_l2table_addr(smpt));
        self.io.write32(reg_ns_l1entry_attr(vid, gb), L1EntryAttr::for_l2(gran).raw());
        Ok(())
    }

    /// Enable the unit and fault interrupts for `vids`
    pub fn set_control_regs(&self, vids: Bitmap32) {
        self.io.write32(REG_NS_INTERRUPT_ENABLE_PER_VID_SET, vids.raw());

        let mut ctrl0 = LocalRegisterCopy::<u32, CTRL0::Register>::new(0);
        ctrl0.modify(CTRL0::ENABLE::SET + CTRL0::INTERRUPT_ENABLE::SET + CTRL0::FAULT_RESP_TYPE_DECERR::SET);
        self.io.write32(REG_NS_CTRL0, ctrl0.get());
    }

    /// Drop every MPTC entry
    pub fn invalidate_all(&self) {
        self.io.write32(REG_NS_ALL_INVALIDATION, 1);
    }

    /// Drop MPTC entries covering `[start, end)`
    pub fn invalidate_range(&self, start: PhysAddr, end: PhysAddr) {
        if start >= end {
            return;
        }
        self.io.write32(REG_NS_RANGE_INVALIDATION_START_PPN, (start >> PAGE_SHIFT) as u32);
        self.io.write32(REG_NS_RANGE_INVALIDATION_END_PPN, ((end - 1) >> PAGE_SHIFT) as u32);
        self.io.write32(REG_NS_RANGE_INVALIDATION, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRegisters;
    use test_case::test_case;

    #[test]
    fn test_register_offsets() {
        assert_eq!(reg_ns_fault_pa_low(0), 0x2004);
        assert_eq!(reg_ns_fault_pa_high(3), 0x2068);
        assert_eq!(reg_ns_fault_info(7), 0x20f0);
        assert_eq!(reg_ns_l1entry_l2table_addr(1, 2), 0x4210);
        assert_eq!(reg_ns_l1entry_attr(7, 63), 0x4004 + 0xe00 + 0x1f8);
        assert!(reg_ns_l1entry_attr(NR_VIDS - 1, NR_GIGABYTES - 1) + 4 <= REG_BLOCK_SIZE);
    }

    #[test]
    fn test_mmio_region_volatile_access() {
        let mut block = vec![0u32; REG_BLOCK_SIZE / 4];
        let base = NonNull::new(block.as_mut_ptr() as *mut u8).unwrap();
        let mmio = unsafe { MmioRegion::new(base, REG_BLOCK_SIZE) }.unwrap();

        mmio.write32(REG_NS_FAULT_STATUS, 0b101);
        assert_eq!(mmio.read32(REG_NS_FAULT_STATUS), 0b101);
        let regs = S2mpuRegs::new(mmio);
        assert_eq!(regs.read_fault_status().raw(), 0b101);
        drop(regs);
        assert_eq!(block[REG_NS_FAULT_STATUS / 4], 0b101);
    }

    #[test]
    fn test_mmio_region_rejects_undersized_mapping() {
        let mut block = vec![0u32; 0x100 / 4];
        let base = NonNull::new(block.as_mut_ptr() as *mut u8).unwrap();
        assert!(matches!(
            unsafe { MmioRegion::new(base, 0x100) },
            Err(Error::InvalidArgument)
        ));
    }

    #[test_case(REG_BLOCK_SIZE ; "one past the end")]
    #[test_case(REG_BLOCK_SIZE - 2 ; "straddling the end")]
    #[test_case(REG_NS_FAULT_STATUS + 1 ; "unaligned")]
    #[test_case(usize::MAX - 3 ; "overflowing")]
    fn test_mmio_region_ignores_out_of_range_offsets(offset: usize) {
        let mut block = vec![0u32; REG_BLOCK_SIZE / 4];
        let base = NonNull::new(block.as_mut_ptr() as *mut u8).unwrap();
        let mmio = unsafe { MmioRegion::new(base, REG_BLOCK_SIZE) }.unwrap();

        mmio.write32(offset, 0xffff_ffff);
        assert_eq!(mmio.read32(offset), 0);
        drop(mmio);
        assert!(block.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_mptc_way_limit_matches_select_field() {
        assert_eq!(MPTC_MAX_WAYS, READ_MPTC::WAY.mask + 1);
    }

    #[test]
    fn test_fault_info_fields() {
        let info = FaultInfo::new(0x0354_0042);
        assert_eq!(info.vid(), 3);
        assert_eq!(info.type_code(), FAULT_INFO_TYPE_AP);
        assert!(info.is_write());
        assert_eq!(info.req_len(), 4);
        assert_eq!(info.axi_id(), 0x42);
        assert_eq!(FaultInfo::build(3, FAULT_INFO_TYPE_AP, true, 4, 0x42), info);
    }

    #[test]
    fn test_l1entry_attr_encoding() {
        assert_eq!(L1EntryAttr::for_1g(MptProt::RW).raw(), 0b110);
        assert_eq!(L1EntryAttr::for_1g(MptProt::R).raw(), 0b010);
        assert_eq!(L1EntryAttr::for_l2(L1ENTRY_ATTR_GRAN_4K).raw(), 0b1);
        assert_eq!(L1EntryAttr::for_l2(L1ENTRY_ATTR_GRAN_2M).raw(), 0b10_0001);
        assert_eq!(l1entry_l2table_addr(0x8_8000_0000), 0x8800_0000);
    }

    #[test]
    fn test_fault_pa_combines_halves() {
        let fake = FakeRegisters::new();
        fake.set(reg_ns_fault_pa_high(2), 0x8);
        fake.set(reg_ns_fault_pa_low(2), 0x1234_5000);
        let regs = S2mpuRegs::new(&fake);
        assert_eq!(regs.read_fault_pa(2), Ok(0x8_1234_5000));
    }

    #[test_case(NR_VIDS ; "first vid past range")]
    #[test_case(31 ; "last status bit")]
    fn test_vid_bounds(vid: u32) {
        let fake = FakeRegisters::new();
        let regs = S2mpuRegs::new(&fake);
        assert_eq!(regs.read_fault_info(vid), Err(Error::InvalidArgument));
        assert_eq!(regs.read_fault_pa(vid), Err(Error::InvalidArgument));
        assert_eq!(regs.clear_fault(vid), Err(Error::InvalidArgument));
        assert_eq!(regs.read_l1_entry(vid, 0), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_fault_info_of_non_pending_vid_still_reads() {
        let fake = FakeRegisters::new();
        fake.set(reg_ns_fault_info(5), 0x0520_0000);
        let regs = S2mpuRegs::new(&fake);
        assert!(regs.read_fault_status().is_empty());
        assert_eq!(regs.read_fault_info(5).unwrap().raw(), 0x0520_0000);
    }

    #[test]
    fn test_clear_fault_deasserts_status() {
        let fake = FakeRegisters::new();
        fake.raise_fault(1, 0x1000, FaultInfo::build(1, FAULT_INFO_TYPE_MPTW, false, 0, 0));
        fake.raise_fault(3, 0x2000, FaultInfo::build(3, FAULT_INFO_TYPE_MPTW, false, 0, 0));
        let regs = S2mpuRegs::new(&fake);

        assert_eq!(regs.read_fault_status().raw(), 0b1010);
        regs.clear_fault(1).unwrap();
        assert_eq!(regs.read_fault_status().raw(), 0b1000);
        assert_eq!(fake.writes_to(REG_NS_INTERRUPT_CLEAR), vec![0b10]);
    }

    #[test]
    fn test_read_l1_entry() {
        let fake = FakeRegisters::new();
        fake.set(reg_ns_l1entry_attr(2, 5), 0x21);
        fake.set(reg_ns_l1entry_l2table_addr(2, 5), 0x0880_0000);
        let regs = S2mpuRegs::new(&fake);

        let entry = regs.read_l1_entry(2, 5).unwrap();
        assert!(entry.attr.l2table_enabled());
        assert_eq!(entry.attr.gran_code(), L1ENTRY_ATTR_GRAN_2M);
        assert_eq!(entry.l2table_pa(), 0x8800_0000);
        assert_eq!(regs.read_l1_entry(2, NR_GIGABYTES), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_read_mptc_selects_then_reads() {
        let fake = FakeRegisters::new();
        fake.set_mptc(1, 2, 0x00ab_cdef, 0x0000_0521, 0xffff_0000);
        let regs = S2mpuRegs::new(&fake);

        let entry = regs.read_mptc(1, 2).unwrap();
        assert_eq!(fake.writes_to(REG_NS_READ_MPTC), vec![0x0002_0001]);
        assert!(entry.valid);
        assert_eq!(entry.vid, 5);
        assert_eq!(entry.gran, 2);
        assert_eq!(entry.ppn, 0xab_cdef);
        assert_eq!(entry.data, 0xffff_0000);

        let empty = regs.read_mptc(0, 0).unwrap();
        assert!(!empty.valid);
        assert_eq!(regs.read_mptc(0, 8), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_version_and_info() {
        let fake = FakeRegisters::new();
        fake.set(REG_NS_VERSION, 0x1100_0003);
        fake.set(REG_NS_INFO, 0x0004_0002);
        let regs = S2mpuRegs::new(&fake);
        assert_eq!(regs.read_version(), Version { major: 1, minor: 1, rev: 3 });
        assert_eq!(regs.read_info(), MptcGeometry { sets: 2, ways: 4 });
    }

    #[test]
    fn test_programming_writes() {
        let fake = FakeRegisters::new();
        let regs = S2mpuRegs::new(&fake);

        regs.write_l1_entry_l2(4, 1, 0x9000_0000, L1ENTRY_ATTR_GRAN_4K).unwrap();
        assert_eq!(fake.get(reg_ns_l1entry_l2table_addr(4, 1)), 0x0900_0000);
        assert_eq!(fake.get(reg_ns_l1entry_attr(4, 1)), 0x1);

        regs.set_control_regs(ALL_VIDS_BITMAP);
        assert_eq!(fake.get(REG_NS_INTERRUPT_ENABLE_PER_VID_SET), 0xff);
        assert_eq!(fake.get(REG_NS_CTRL0), 0b111);

        regs.invalidate_range(0x8000_0000, 0x8020_0000);
        assert_eq!(fake.get(REG_NS_RANGE_INVALIDATION_START_PPN), 0x8_0000);
        assert_eq!(fake.get(REG_NS_RANGE_INVALIDATION_END_PPN), 0x8_01ff);
        assert_eq!(fake.writes_to(REG_NS_RANGE_INVALIDATION), vec![1]);
    }
}
