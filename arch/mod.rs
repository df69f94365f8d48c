//! Architecture support

#[cfg(feature = "arch_arm64")]
pub mod arm64;
