//! Small fixed-width bitmap
//!
//! Used for the per-VID bitmaps the S2MPU exposes (fault status, interrupt
//! enable, interrupt clear). One bit per VID, bit index == VID.

use core::fmt;

/// 32-bit bitmap, one bit per ID
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Bitmap32(u32);

impl Bitmap32 {
    /// Empty bitmap
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw register value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Bitmap with the lowest `count` bits set
    pub const fn first_n(count: u32) -> Self {
        if count >= 32 {
            Self(u32::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    /// Bitmap with only `index` set
    pub const fn bit(index: u32) -> Self {
        Self(1 << index)
    }

    /// Raw value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Test if a bit is set
    pub const fn test(self, index: u32) -> bool {
        index < 32 && (self.0 >> index) & 1 == 1
    }

    /// Check if no bits are set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Find the first (lowest) set bit
    pub const fn find_first_set(self) -> Option<u32> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros())
        }
    }

    /// Keep only the bits also set in `mask`
    pub const fn and(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }

    /// Bits set here but not in `mask`
    pub const fn without(self, mask: Self) -> Self {
        Self(self.0 & !mask.0)
    }
}

impl fmt::Debug for Bitmap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap32({:#010x})", self.0)
    }
}
