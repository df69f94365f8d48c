//! Memory management module
//!
//! DMA page handles, the allocator seam they come from, and the memory
//! protection table built on top of them.

use core::ptr::NonNull;

pub mod mpt;

/// Physical address type
pub type PhysAddr = u64;

/// Page frame number type
pub type FrameNr = u64;

/// Page size (4KB)
pub const PAGE_SIZE: u64 = 4096;

/// Page shift (number of bits for page offset)
pub const PAGE_SHIFT: u32 = 12;

/// One gigabyte, the granule covered by a single L1 entry
pub const SZ_1G: u64 = 1 << 30;

/// Size in bytes of an allocation of `2^order` pages
pub const fn order_size(order: u32) -> usize {
    (PAGE_SIZE as usize) << order
}

/// Check whether `addr` is page aligned
pub const fn is_page_aligned(addr: u64) -> bool {
    addr & (PAGE_SIZE - 1) == 0
}

/// A run of `2^order` physically contiguous, zeroed pages from a DMA-capable
/// zone.
///
/// The handle owns the pages until it is given back to the
/// [`PageAllocator`] that produced it. Dropping it without freeing leaks the
/// pages.
#[derive(Debug)]
pub struct DmaPages {
    /// Host virtual address of the first page
    virt: NonNull<u8>,
    /// Physical address of the first page
    phys: PhysAddr,
    /// Allocation order
    order: u32,
}

// The pages are exclusively owned by the handle.
unsafe impl Send for DmaPages {}

impl DmaPages {
    /// Wrap an allocation
    ///
    /// # Safety
    /// `virt` must point to `order_size(order)` bytes of page-aligned memory
    /// that stays valid and unaliased until the handle is freed, and `phys`
    /// must be the physical address of the same memory.
    pub unsafe fn new(virt: NonNull<u8>, phys: PhysAddr, order: u32) -> Self {
        debug_assert!(is_page_aligned(phys));
        debug_assert!(virt.as_ptr() as usize % PAGE_SIZE as usize == 0);
        Self { virt, phys, order }
    }

    /// Physical address of the first page
    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    /// Page frame number of the first page
    pub fn pfn(&self) -> FrameNr {
        self.phys >> PAGE_SHIFT
    }

    /// Allocation order
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        order_size(self.order)
    }

    /// Host virtual address
    pub fn as_ptr(&self) -> *mut u8 {
        self.virt.as_ptr()
    }

    /// View the pages as 32-bit words
    pub fn as_u32_slice(&self) -> &[u32] {
        // SAFETY: page aligned, valid for len() bytes, owned by self
        unsafe { core::slice::from_raw_parts(self.virt.as_ptr() as *const u32, self.len() / 4) }
    }

    /// View the pages as mutable 32-bit words
    pub fn as_u32_slice_mut(&mut self) -> &mut [u32] {
        // SAFETY: page aligned, valid for len() bytes, owned by self
        unsafe { core::slice::from_raw_parts_mut(self.virt.as_ptr() as *mut u32, self.len() / 4) }
    }

    /// View the pages as 64-bit words
    pub fn as_u64_slice(&self) -> &[u64] {
        // SAFETY: page aligned, valid for len() bytes, owned by self
        unsafe { core::slice::from_raw_parts(self.virt.as_ptr() as *const u64, self.len() / 8) }
    }

    /// View the pages as mutable 64-bit words
    pub fn as_u64_slice_mut(&mut self) -> &mut [u64] {
        // SAFETY: page aligned, valid for len() bytes, owned by self
        unsafe { core::slice::from_raw_parts_mut(self.virt.as_ptr() as *mut u64, self.len() / 8) }
    }
}

/// Source of DMA-capable pages
///
/// Every page handed to the S2MPU or shared with the hypervisor must satisfy
/// the device's addressing constraints; implementations allocate from the
/// matching zone.
pub trait PageAllocator {
    /// Allocate `2^order` zeroed, contiguous pages
    fn alloc_pages(&self, order: u32) -> Option<DmaPages>;

    /// Give pages back
    fn free_pages(&self, pages: DmaPages);
}

impl<A: PageAllocator + ?Sized> PageAllocator for &A {
    fn alloc_pages(&self, order: u32) -> Option<DmaPages> {
        (**self).alloc_pages(order)
    }

    fn free_pages(&self, pages: DmaPages) {
        (**self).free_pages(pages)
    }
}
