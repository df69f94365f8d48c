//! Device drivers
//!
//! Drivers for the memory protection hardware sitting in front of DMA-capable
//! peripherals.

pub mod s2mpu;

pub use s2mpu::S2mpu;
