//! Memory Protection Table (MPT)
//!
//! Host-side model of the table the S2MPU consults on every DMA transaction.
//! The covered physical address space is split into 1GB granules. Each
//! granule either carries one protection for the whole gigabyte (an L1-only
//! "1G" entry) or points to a second-level table (SMPT) holding 2 protection
//! bits for every 4KB page.
//!
//! Updates happen in two phases: [`Mpt::prepare_range`] edits the in-memory
//! table and records which levels changed, then the device driver programs
//! the changed entries and invalidates its cache.

use alloc::vec::Vec;
use core::ops::Range;

use bitflags::bitflags;

use super::{order_size, DmaPages, PageAllocator, PhysAddr, PAGE_SHIFT, PAGE_SIZE, SZ_1G};
use crate::{Error, Result};

/// Number of 1GB granules covered by one S2MPU
pub const NR_GIGABYTES: usize = 64;

/// Protection bits per SMPT element
pub const MPT_PROT_BITS: u32 = 2;

/// Granularity of one SMPT element
pub const SMPT_GRAN: u64 = PAGE_SIZE;

/// SMPT word width in bytes
pub const SMPT_WORD_SIZE: usize = core::mem::size_of::<u32>();

/// SMPT elements packed in one word
pub const SMPT_ELEMS_PER_WORD: usize = SMPT_WORD_SIZE * 8 / MPT_PROT_BITS as usize;

/// SMPT elements per gigabyte
pub const SMPT_NUM_ELEMS: usize = (SZ_1G / SMPT_GRAN) as usize;

/// SMPT size in bytes
pub const SMPT_SIZE: usize = SMPT_NUM_ELEMS * MPT_PROT_BITS as usize / 8;

/// SMPT size in words
pub const SMPT_NUM_WORDS: usize = SMPT_SIZE / SMPT_WORD_SIZE;

/// Page allocation order of one SMPT buffer
pub const SMPT_ORDER: u32 = (SMPT_SIZE / PAGE_SIZE as usize).trailing_zeros();

/// Bytes of address space covered by one SMPT word
const SMPT_WORD_SPAN: u64 = SMPT_GRAN * SMPT_ELEMS_PER_WORD as u64;

/// Size of one granule descriptor in the shared descriptor page
pub const FMPT_DESC_SIZE: usize = 2 * core::mem::size_of::<u64>();

/// Size of the shared descriptor table
pub const MPT_DESC_SIZE: usize = NR_GIGABYTES * FMPT_DESC_SIZE;

const _: () = assert!(MPT_DESC_SIZE <= PAGE_SIZE as usize);
const _: () = assert!(order_size(SMPT_ORDER) == SMPT_SIZE);

/// Access permission of a granule or page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MptProt {
    /// No access
    None = 0,
    /// Read only
    R = 1,
    /// Write only
    W = 2,
    /// Read and write
    RW = 3,
}

impl MptProt {
    /// Mask of valid protection bits
    pub const MASK: u32 = 0b11;

    /// Decode the low protection bits
    pub const fn from_bits(bits: u32) -> Self {
        match bits & Self::MASK {
            0 => MptProt::None,
            1 => MptProt::R,
            2 => MptProt::W,
            _ => MptProt::RW,
        }
    }

    /// Raw protection bits
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// SMPT word with every element set to this protection
    pub const fn smpt_word(self) -> u32 {
        // 0b01 replicated in every 2-bit slot
        self.bits() * 0x5555_5555
    }
}

bitflags! {
    /// Table levels touched by the last prepare step
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MptUpdate: u8 {
        /// L1 entry must be reprogrammed
        const L1 = 1 << 0;
        /// SMPT contents changed
        const L2 = 1 << 1;
    }
}

/// One gigabyte granule of the MPT
#[derive(Debug)]
pub struct Fmpt {
    /// Second-level table, owned even while the granule is mapped as 1G
    smpt: DmaPages,
    /// Whole gigabyte shares one protection
    gran_1g: bool,
    /// Protection of the whole gigabyte, meaningful when `gran_1g`
    prot: MptProt,
    /// Levels changed by the last prepare step
    flags: MptUpdate,
}

impl Fmpt {
    fn new(smpt: DmaPages) -> Self {
        Self {
            smpt,
            gran_1g: true,
            prot: MptProt::None,
            flags: MptUpdate::L1,
        }
    }

    /// Granule is mapped as a whole
    pub fn gran_1g(&self) -> bool {
        self.gran_1g
    }

    /// Whole-granule protection
    pub fn prot(&self) -> MptProt {
        self.prot
    }

    /// Levels needing reprogramming
    pub fn flags(&self) -> MptUpdate {
        self.flags
    }

    /// Physical address of the SMPT
    pub fn smpt_phys(&self) -> PhysAddr {
        self.smpt.phys()
    }

    /// SMPT contents
    pub fn smpt_words(&self) -> &[u32] {
        &self.smpt.as_u32_slice()[..SMPT_NUM_WORDS]
    }

    /// Effective protection at `offset` bytes into the granule
    pub fn prot_at(&self, offset: u64) -> MptProt {
        if self.gran_1g {
            return self.prot;
        }
        let elem = (offset / SMPT_GRAN) as usize;
        let word = self.smpt_words()[elem / SMPT_ELEMS_PER_WORD];
        let shift = (elem % SMPT_ELEMS_PER_WORD) as u32 * MPT_PROT_BITS;
        MptProt::from_bits(word >> shift)
    }

    /// Packed descriptor attribute word
    fn desc_attr(&self) -> u64 {
        self.prot.bits() as u64
            | (self.gran_1g as u64) << 8
            | (self.flags.bits() as u64) << 16
    }

    /// Apply `prot` to `[start, end)`, byte offsets within the granule
    fn set_range(&mut self, start: u64, end: u64, prot: MptProt) {
        self.flags = MptUpdate::empty();

        if start == 0 && end >= SZ_1G {
            // Update covers the entire granule
            if self.gran_1g && self.prot == prot {
                return;
            }
            self.gran_1g = true;
            self.prot = prot;
            self.flags = MptUpdate::L1;
            return;
        }

        if self.gran_1g {
            if self.prot == prot {
                return;
            }
            // Range differs from the rest of the granule, split into pages
            let old = self.prot;
            let smpt = self.smpt.as_u32_slice_mut();
            set_smpt_range(smpt, 0, start, old);
            set_smpt_range(smpt, start, end, prot);
            set_smpt_range(smpt, end, SZ_1G, old);
            self.gran_1g = false;
            self.flags = MptUpdate::L1 | MptUpdate::L2;
            return;
        }

        set_smpt_range(self.smpt.as_u32_slice_mut(), start, end, prot);
        if !is_smpt_uniform(self.smpt_words(), prot) {
            self.flags = MptUpdate::L2;
            return;
        }

        // Every page ended up with the same protection, fold back to 1G
        self.gran_1g = true;
        self.prot = prot;
        self.flags = MptUpdate::L1;
    }
}

/// Write `prot` for the pages in `[start, end)` of one SMPT
fn set_smpt_range(smpt: &mut [u32], start: u64, end: u64, prot: MptProt) {
    let mut addr = start;

    // Leading pages up to the first full word
    while addr < end && addr % SMPT_WORD_SPAN != 0 {
        set_smpt_elem(smpt, addr, prot);
        addr += SMPT_GRAN;
    }

    // Full words
    let full_end = end - end % SMPT_WORD_SPAN;
    if addr < full_end {
        let first = (addr / SMPT_WORD_SPAN) as usize;
        let last = (full_end / SMPT_WORD_SPAN) as usize;
        smpt[first..last].fill(prot.smpt_word());
        addr = full_end;
    }

    // Trailing pages
    while addr < end {
        set_smpt_elem(smpt, addr, prot);
        addr += SMPT_GRAN;
    }
}

fn set_smpt_elem(smpt: &mut [u32], offset: u64, prot: MptProt) {
    let elem = (offset / SMPT_GRAN) as usize;
    let idx = elem / SMPT_ELEMS_PER_WORD;
    let shift = (elem % SMPT_ELEMS_PER_WORD) as u32 * MPT_PROT_BITS;
    smpt[idx] = (smpt[idx] & !(MptProt::MASK << shift)) | (prot.bits() << shift);
}

fn is_smpt_uniform(smpt: &[u32], prot: MptProt) -> bool {
    let word = prot.smpt_word();
    smpt.iter().all(|&w| w == word)
}

/// The memory protection table of one S2MPU address space
#[derive(Debug)]
pub struct Mpt {
    fmpt: Vec<Fmpt>,
}

impl Mpt {
    /// Allocate the SMPT buffers for every granule
    ///
    /// All granules start mapped as 1G with no access. On allocation failure
    /// every buffer allocated so far is returned before the error is.
    pub fn new<A: PageAllocator + ?Sized>(alloc: &A) -> Result<Self> {
        let mut fmpt = Vec::with_capacity(NR_GIGABYTES);
        for gb in 0..NR_GIGABYTES {
            match alloc.alloc_pages(SMPT_ORDER) {
                Some(smpt) => fmpt.push(Fmpt::new(smpt)),
                None => {
                    log::error!("s2mpu: SMPT allocation failed for granule {}", gb);
                    for entry in fmpt.drain(..) {
                        alloc.free_pages(entry.smpt);
                    }
                    return Err(Error::OutOfMemory);
                }
            }
        }
        Ok(Self { fmpt })
    }

    /// Return every SMPT buffer to `alloc`
    pub fn release<A: PageAllocator + ?Sized>(self, alloc: &A) {
        for entry in self.fmpt {
            alloc.free_pages(entry.smpt);
        }
    }

    /// Granule entry
    pub fn fmpt(&self, gb: usize) -> Option<&Fmpt> {
        self.fmpt.get(gb)
    }

    /// Iterate over all granules
    pub fn iter(&self) -> impl Iterator<Item = &Fmpt> {
        self.fmpt.iter()
    }

    /// Granule indices touched by `[start, end)`
    pub fn gigabytes(start: PhysAddr, end: PhysAddr) -> Range<usize> {
        if start >= end {
            return 0..0;
        }
        (start / SZ_1G) as usize..((end - 1) / SZ_1G) as usize + 1
    }

    /// Set the protection of the page-aligned range `[start, end)`
    ///
    /// Only edits the in-memory table; the update flags of every touched
    /// granule describe what the device needs to reprogram.
    pub fn prepare_range(&mut self, start: PhysAddr, end: PhysAddr, prot: MptProt) -> Result<()> {
        if start >= end
            || !super::is_page_aligned(start)
            || !super::is_page_aligned(end)
            || end > NR_GIGABYTES as u64 * SZ_1G
        {
            return Err(Error::InvalidArgument);
        }

        for gb in Self::gigabytes(start, end) {
            let gb_base = gb as u64 * SZ_1G;
            let gb_start = start.max(gb_base) - gb_base;
            let gb_end = end.min(gb_base + SZ_1G) - gb_base;
            self.fmpt[gb].set_range(gb_start, gb_end, prot);
        }

        log::debug!(
            "s2mpu: prepared [{:#x}, {:#x}) prot={:?} ({} pages)",
            start,
            end,
            prot,
            (end - start) >> PAGE_SHIFT
        );
        Ok(())
    }

    /// Effective protection of a physical address
    pub fn prot_at(&self, pa: PhysAddr) -> Option<MptProt> {
        let gb = (pa / SZ_1G) as usize;
        self.fmpt.get(gb).map(|entry| entry.prot_at(pa % SZ_1G))
    }

    /// Serialize the granule descriptors into the shared descriptor page
    ///
    /// Each granule takes two 64-bit words: the SMPT physical address and
    /// `prot | gran_1g << 8 | flags << 16`.
    pub fn write_descriptors(&self, desc: &mut DmaPages) {
        let words = desc.as_u64_slice_mut();
        for (gb, entry) in self.fmpt.iter().enumerate() {
            words[gb * 2] = entry.smpt_phys();
            words[gb * 2 + 1] = entry.desc_attr();
        }
    }
}
