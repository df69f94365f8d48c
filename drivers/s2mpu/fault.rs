//! S2MPU fault decoding
//!
//! Maps raw FAULT_INFO and L1ENTRY_ATTR bitfields to the categories used in
//! fault reports. Unrecognized but well-formed values decode to explicit
//! "unknown"/"invalid" categories, never to errors.

use core::fmt;

use super::regs::{
    FaultInfo, L1EntryAttr, FAULT_INFO_TYPE_AP, FAULT_INFO_TYPE_CONTEXT, FAULT_INFO_TYPE_MPTW,
    L1ENTRY_ATTR_GRAN_2M, L1ENTRY_ATTR_GRAN_4K, L1ENTRY_ATTR_GRAN_64K,
};
use crate::mm::mpt::MptProt;
use crate::mm::PhysAddr;

/// Direction of the faulting transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Read => "read",
            Direction::Write => "write",
        })
    }
}

/// S2MPU fault types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Table walk fault
    Mptw,
    /// Access permission fault
    AccessPermission,
    /// Context fault (v2 hardware only)
    Context,
    /// Unknown fault
    Unknown,
}

impl FaultType {
    /// Human-readable fault description
    pub fn description(self) -> &'static str {
        match self {
            FaultType::Mptw => "MPTW fault",
            FaultType::AccessPermission => "access permission fault",
            FaultType::Context => "context fault",
            FaultType::Unknown => "unknown fault",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Direction of a fault
pub fn decode_direction(info: FaultInfo) -> Direction {
    if info.is_write() {
        Direction::Write
    } else {
        Direction::Read
    }
}

/// Type of a fault
pub fn decode_fault_type(info: FaultInfo) -> FaultType {
    match info.type_code() {
        FAULT_INFO_TYPE_MPTW => FaultType::Mptw,
        FAULT_INFO_TYPE_AP => FaultType::AccessPermission,
        FAULT_INFO_TYPE_CONTEXT => FaultType::Context,
        _ => FaultType::Unknown,
    }
}

/// Granularity of an L1 entry
///
/// Without an L2 table the entry covers the whole gigabyte and the GRAN
/// field is not decoded at all.
pub fn decode_granularity(attr: L1EntryAttr) -> &'static str {
    if !attr.l2table_enabled() {
        return "1G";
    }
    match attr.gran_code() {
        L1ENTRY_ATTR_GRAN_4K => "4K",
        L1ENTRY_ATTR_GRAN_64K => "64K",
        L1ENTRY_ATTR_GRAN_2M => "2M",
        _ => "invalid",
    }
}

/// Protection of an L1 entry
///
/// With an L2 table the protection lives in the table and is unknown at
/// this level.
pub fn decode_protection(attr: L1EntryAttr) -> &'static str {
    if attr.l2table_enabled() {
        return "??";
    }
    match attr.prot_code() {
        code if code == MptProt::None.bits() => "0",
        code if code == MptProt::R.bits() => "R",
        code if code == MptProt::W.bits() => "W",
        code if code == MptProt::RW.bits() => "RW",
        _ => "invalid",
    }
}

/// One decoded fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultRecord {
    /// VID whose fault status bit was set
    pub vid: u32,
    /// Faulting physical address
    pub pa: PhysAddr,
    /// Read or write
    pub direction: Direction,
    /// Fault type
    pub fault_type: FaultType,
    /// Requested transfer length
    pub req_len: u32,
    /// Requester AXI ID
    pub axi_id: u32,
    /// Raw FAULT_INFO word
    pub info: FaultInfo,
}

impl FaultRecord {
    /// Decode the registers of one fault
    pub fn decode(vid: u32, pa: PhysAddr, info: FaultInfo) -> Self {
        Self {
            vid,
            pa,
            direction: decode_direction(info),
            fault_type: decode_fault_type(info),
            req_len: info.req_len(),
            axi_id: info.axi_id(),
            info,
        }
    }

    /// VID recorded in FAULT_INFO
    pub fn info_vid(&self) -> u32 {
        self.info.vid()
    }

    /// FAULT_INFO agrees with the status bit the record was read for
    pub fn vid_consistent(&self) -> bool {
        self.info_vid() == self.vid
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "============== S2MPU FAULT DETECTED ==============")?;
        writeln!(f, "  PA={:#x}, FAULT_INFO={:#010x}", self.pa, self.info.raw())?;
        writeln!(f, "  DIRECTION: {}, TYPE: {}", self.direction, self.fault_type)?;
        writeln!(f, "  VID={}, REQ_LENGTH={}, REQ_AXI_ID={}", self.vid, self.req_len, self.axi_id)?;
        write!(f, "==================================================")
    }
}
