//! Utility functions and data structures
//!
//! Memory barriers for ordering MMIO accesses and the per-VID bitmap type.

pub mod bitmap;

pub use self::bitmap::Bitmap32;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        use aarch64_cpu::asm::barrier;

        /// Write memory barrier
        #[inline]
        pub fn wmb() {
            barrier::dmb(barrier::ST);
        }

        /// Full memory barrier
        #[inline]
        pub fn mb() {
            barrier::dmb(barrier::SY);
        }
    } else {
        use core::sync::atomic::{fence, Ordering};

        /// Write memory barrier
        #[inline]
        pub fn wmb() {
            fence(Ordering::Release);
        }

        /// Full memory barrier
        #[inline]
        pub fn mb() {
            fence(Ordering::SeqCst);
        }
    }
}
