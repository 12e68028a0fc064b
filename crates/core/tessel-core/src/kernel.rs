//! Process-wide kernel state shared with the architecture layer.
//!
//! [`KERNEL`] is initialized at compile time (every nesting depth is zero in
//! the loaded image), so there is no runtime init call and it is valid from
//! the first instruction of the kernel.

use crate::cpu_local::{CpuLocal, MAX_CPUS};
use crate::nesting::NestingCounter;

/// Kernel singleton state.
pub struct KernelState {
    /// Interrupt nesting depth, one counter per CPU.
    nested: CpuLocal<NestingCounter>,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            nested: CpuLocal::new([const { NestingCounter::new() }; MAX_CPUS]),
        }
    }

    /// Nesting counter of the executing CPU.
    #[inline]
    pub fn nesting(&self) -> &NestingCounter {
        self.nested.get()
    }

    /// Nesting counter of a specific CPU.
    pub fn nesting_for(&self, cpu: u32) -> &NestingCounter {
        self.nested.get_for(cpu)
    }

    /// Returns `true` if the executing CPU is in interrupt context.
    #[inline]
    pub fn is_in_isr(&self) -> bool {
        self.nesting().is_nested()
    }
}

/// The kernel singleton.
pub static KERNEL: KernelState = KernelState::new();

/// Shorthand for `KERNEL.is_in_isr()`.
#[inline]
pub fn is_in_isr() -> bool {
    KERNEL.is_in_isr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_uses_cpu_zero_counter() {
        let state = KernelState::new();
        assert!(!state.is_in_isr());
        let guard = state.nesting().enter();
        assert!(state.is_in_isr());
        assert_eq!(state.nesting_for(0).depth(), 1);
        assert_eq!(state.nesting_for(1).depth(), 0);
        drop(guard);
        assert!(!state.is_in_isr());
    }
}
