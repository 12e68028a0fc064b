//! Exception Syndrome Register decoding.

use core::fmt;

/// Exception class, `ESR_ELx.EC` (bits `[31:26]`).
///
/// Only the classes the kernel reports by name are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionClass {
    /// Unknown reason.
    Unknown,
    /// `SVC` executed in AArch64 state.
    SvcAarch64,
    /// `HVC` executed in AArch64 state.
    HvcAarch64,
    /// `SMC` executed in AArch64 state.
    SmcAarch64,
    /// Instruction abort from a lower level.
    InstructionAbortLower,
    /// Instruction abort at the same level.
    InstructionAbortSame,
    /// Data abort from a lower level.
    DataAbortLower,
    /// Data abort at the same level.
    DataAbortSame,
    /// `BRK` executed in AArch64 state.
    Brk,
    /// Any other class.
    Other(u8),
}

impl ExceptionClass {
    /// Decodes a 6-bit class value.
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            0x00 => Self::Unknown,
            0x15 => Self::SvcAarch64,
            0x16 => Self::HvcAarch64,
            0x17 => Self::SmcAarch64,
            0x20 => Self::InstructionAbortLower,
            0x21 => Self::InstructionAbortSame,
            0x24 => Self::DataAbortLower,
            0x25 => Self::DataAbortSame,
            0x3c => Self::Brk,
            other => Self::Other(other),
        }
    }

    /// The 6-bit class value.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Unknown => 0x00,
            Self::SvcAarch64 => 0x15,
            Self::HvcAarch64 => 0x16,
            Self::SmcAarch64 => 0x17,
            Self::InstructionAbortLower => 0x20,
            Self::InstructionAbortSame => 0x21,
            Self::DataAbortLower => 0x24,
            Self::DataAbortSame => 0x25,
            Self::Brk => 0x3c,
            Self::Other(bits) => bits,
        }
    }
}

/// Raw `ESR_ELx` value.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Syndrome(u64);

impl Syndrome {
    const EC_SHIFT: u32 = 26;
    const EC_MASK: u64 = 0x3f;
    const IL_BIT: u64 = 1 << 25;
    const ISS_MASK: u64 = 0x01ff_ffff;

    /// Wraps a raw register value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Builds the syndrome an `svc #imm` from AArch64 produces.
    pub const fn for_svc(imm: u16) -> Self {
        Self((0x15_u64 << Self::EC_SHIFT) | Self::IL_BIT | imm as u64)
    }

    /// The raw register value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Exception class.
    pub const fn class(self) -> ExceptionClass {
        ExceptionClass::from_bits(((self.0 >> Self::EC_SHIFT) & Self::EC_MASK) as u8)
    }

    /// `true` for a 32-bit trapped instruction.
    pub const fn is_32bit_instruction(self) -> bool {
        self.0 & Self::IL_BIT != 0
    }

    /// Instruction-specific syndrome, bits `[24:0]`.
    pub const fn iss(self) -> u32 {
        (self.0 & Self::ISS_MASK) as u32
    }

    /// The 16-bit immediate of an `SVC`/`HVC`/`SMC`, `ISS[15:0]`.
    pub const fn call_immediate(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Debug for Syndrome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Syndrome")
            .field("class", &self.class())
            .field("iss", &format_args!("{:#x}", self.iss()))
            .finish()
    }
}
