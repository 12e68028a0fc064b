//! Exception-level banked system registers.
//!
//! `ESR_ELx`, `SPSR_ELx` and `ELR_ELx` exist once per exception level and
//! are distinct physical registers; code that runs at more than one level
//! has to pick the bank from `CurrentEL` at runtime. [`BankedRegisters`] is
//! that choice behind a trait so the callers can be exercised on a host with
//! a recording mock.

pub mod esr;
pub mod spsr;

/// Privileged exception level the kernel may run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ExceptionLevel {
    /// Kernel.
    El1 = 1,
    /// Hypervisor.
    El2 = 2,
    /// Secure monitor.
    El3 = 3,
}

impl ExceptionLevel {
    /// Converts a level number. EL0 and out-of-range values yield `None`.
    pub const fn from_index(index: u64) -> Option<Self> {
        match index {
            1 => Some(Self::El1),
            2 => Some(Self::El2),
            3 => Some(Self::El3),
            _ => None,
        }
    }

    /// Decodes a raw `CurrentEL` value (level in bits `[3:2]`).
    pub const fn from_current_el(raw: u64) -> Option<Self> {
        Self::from_index((raw >> 2) & 0b11)
    }
}

/// Access to the register bank of one exception level.
pub trait BankedRegisters {
    /// Exception level the CPU is executing at.
    fn current_el(&self) -> ExceptionLevel;

    /// Reads `ESR_ELx` for `el`.
    fn read_esr(&self, el: ExceptionLevel) -> u64;

    /// Writes `SPSR_ELx` for `el`.
    ///
    /// # Safety
    ///
    /// The next exception return from `el` uses this value.
    unsafe fn write_spsr(&mut self, el: ExceptionLevel, value: u64);

    /// Writes `ELR_ELx` for `el`.
    ///
    /// # Safety
    ///
    /// The next exception return from `el` jumps here.
    unsafe fn write_elr(&mut self, el: ExceptionLevel, value: u64);
}

/// The executing CPU's own registers.
#[cfg(target_arch = "aarch64")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Hardware;

#[cfg(target_arch = "aarch64")]
impl BankedRegisters for Hardware {
    #[inline]
    fn current_el(&self) -> ExceptionLevel {
        let raw: u64;
        // SAFETY: CurrentEL is readable at EL1 and above.
        unsafe {
            core::arch::asm!("mrs {}, CurrentEL", out(reg) raw, options(nomem, nostack, preserves_flags));
        }
        // EL0 never runs this; anything that is not EL2 or EL3 is treated
        // as EL1.
        ExceptionLevel::from_current_el(raw).unwrap_or(ExceptionLevel::El1)
    }

    #[inline]
    fn read_esr(&self, el: ExceptionLevel) -> u64 {
        let value: u64;
        // SAFETY: reading the syndrome of the level we execute at has no
        // side effects.
        unsafe {
            match el {
                ExceptionLevel::El1 => core::arch::asm!("mrs {}, esr_el1", out(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El2 => core::arch::asm!("mrs {}, esr_el2", out(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El3 => core::arch::asm!("mrs {}, esr_el3", out(reg) value, options(nomem, nostack, preserves_flags)),
            }
        }
        value
    }

    #[inline]
    unsafe fn write_spsr(&mut self, el: ExceptionLevel, value: u64) {
        unsafe {
            match el {
                ExceptionLevel::El1 => core::arch::asm!("msr spsr_el1, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El2 => core::arch::asm!("msr spsr_el2, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El3 => core::arch::asm!("msr spsr_el3, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
            }
        }
    }

    #[inline]
    unsafe fn write_elr(&mut self, el: ExceptionLevel, value: u64) {
        unsafe {
            match el {
                ExceptionLevel::El1 => core::arch::asm!("msr elr_el1, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El2 => core::arch::asm!("msr elr_el2, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
                ExceptionLevel::El3 => core::arch::asm!("msr elr_el3, {}", in(reg) value, options(nomem, nostack, preserves_flags)),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{BankedRegisters, ExceptionLevel};

    /// Register file that records which bank every access went to.
    #[derive(Debug, Default)]
    pub struct MockRegisters {
        pub level: Option<ExceptionLevel>,
        pub esr: [u64; 4],
        pub spsr: [Option<u64>; 4],
        pub elr: [Option<u64>; 4],
    }

    impl MockRegisters {
        pub fn at(level: ExceptionLevel) -> Self {
            Self {
                level: Some(level),
                ..Self::default()
            }
        }
    }

    impl BankedRegisters for MockRegisters {
        fn current_el(&self) -> ExceptionLevel {
            self.level.unwrap_or(ExceptionLevel::El1)
        }

        fn read_esr(&self, el: ExceptionLevel) -> u64 {
            self.esr[el as usize]
        }

        unsafe fn write_spsr(&mut self, el: ExceptionLevel, value: u64) {
            self.spsr[el as usize] = Some(value);
        }

        unsafe fn write_elr(&mut self, el: ExceptionLevel, value: u64) {
            self.elr[el as usize] = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_el_decodes_bits_3_2() {
        assert_eq!(ExceptionLevel::from_current_el(0b0100), Some(ExceptionLevel::El1));
        assert_eq!(ExceptionLevel::from_current_el(0b1000), Some(ExceptionLevel::El2));
        assert_eq!(ExceptionLevel::from_current_el(0b1100), Some(ExceptionLevel::El3));
        assert_eq!(ExceptionLevel::from_current_el(0), None);
    }

    #[test]
    fn reserved_bits_are_ignored() {
        assert_eq!(ExceptionLevel::from_current_el(0xffff_fff0 | 0b1000), Some(ExceptionLevel::El2));
    }

    #[test]
    fn levels_order_by_privilege() {
        assert!(ExceptionLevel::El1 < ExceptionLevel::El2);
        assert!(ExceptionLevel::El2 < ExceptionLevel::El3);
    }
}
