//! SMCCC (SMC Calling Convention) encoding
//!
//! Reference: ARM DEN 0028 - SMC Calling Convention
//!
//! Function ID layout:
//! - bit 31: fast call
//! - bit 30: 64-bit calling convention
//! - bits 29:24: owning service
//! - bits 15:0: function number

/// SMCCC fast call bit
pub const SMCCC_FAST_CALL: u32 = 0x8000_0000;

/// SMCCC standard call bit
pub const SMCCC_STD_CALL: u32 = 0x0000_0000;

/// SMCCC 64-bit calling convention bit
pub const SMCCC_CALL_CONV_64: u32 = 0x4000_0000;

/// SMCCC 32-bit calling convention
pub const SMCCC_CALL_CONV_32: u32 = 0x0000_0000;

/// Service owner shift and mask
pub const SMCCC_OWNER_SHIFT: u32 = 24;
pub const SMCCC_OWNER_MASK: u32 = 0x3f;

/// Function number mask
pub const SMCCC_FUNC_MASK: u32 = 0xffff;

/// Success in x0
pub const SMCCC_RET_SUCCESS: u64 = 0;

/// Unknown function in x0
pub const SMCCC_RET_NOT_SUPPORTED: i64 = -1;

/// SMCCC call type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SmcccCallType {
    /// Standard call (yielding)
    Standard = SMCCC_STD_CALL,
    /// Fast call (non-yielding)
    Fast = SMCCC_FAST_CALL,
}

/// SMCCC calling convention (register width)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SmcccCallConv {
    /// W0-W7
    Bit32 = SMCCC_CALL_CONV_32,
    /// X0-X7
    Bit64 = SMCCC_CALL_CONV_64,
}

/// SMCCC service owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SmcccOwner {
    Arch = 0x00,
    Cpu = 0x01,
    Sip = 0x02,
    Oem = 0x03,
    Standard = 0x04,
    StandardHyp = 0x05,
    /// Vendor-specific hypervisor service, home of the host hypercalls
    VendorHyp = 0x06,
}

/// Encoded SMCCC function ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcccFunctionId(u32);

impl SmcccFunctionId {
    /// Wrap a raw function ID
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Encode a function ID
    pub const fn build(
        call_type: SmcccCallType,
        call_conv: SmcccCallConv,
        owner: SmcccOwner,
        fn_num: u16,
    ) -> Self {
        Self(
            call_type as u32
                | call_conv as u32
                | ((owner as u32 & SMCCC_OWNER_MASK) << SMCCC_OWNER_SHIFT)
                | fn_num as u32,
        )
    }

    /// Fast 64-bit host hypercall `fn_num`
    pub const fn host_hvc(fn_num: u16) -> Self {
        Self::build(
            SmcccCallType::Fast,
            SmcccCallConv::Bit64,
            SmcccOwner::VendorHyp,
            fn_num,
        )
    }

    /// Raw value for x0
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Fast call bit is set
    pub const fn is_fast(self) -> bool {
        self.0 & SMCCC_FAST_CALL != 0
    }

    /// 64-bit calling convention
    pub const fn is_64bit(self) -> bool {
        self.0 & SMCCC_CALL_CONV_64 != 0
    }

    /// Owning service field
    pub const fn owner(self) -> u32 {
        (self.0 >> SMCCC_OWNER_SHIFT) & SMCCC_OWNER_MASK
    }

    /// Function number field
    pub const fn function_number(self) -> u16 {
        (self.0 & SMCCC_FUNC_MASK) as u16
    }
}

/// Registers returned by a host hypercall
///
/// x0 carries the SMCCC status, x1 the hypercall's own return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcccResult {
    pub x0: u64,
    pub x1: u64,
}

impl SmcccResult {
    pub const fn new(x0: u64, x1: u64) -> Self {
        Self { x0, x1 }
    }

    /// Collapse into the first nonzero status as a signed code
    pub fn status(&self) -> Result<(), i64> {
        if self.x0 != SMCCC_RET_SUCCESS {
            return Err(self.x0 as i64);
        }
        match self.x1 as i64 {
            0 => Ok(()),
            code => Err(code),
        }
    }
}
