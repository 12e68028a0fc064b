//! Interrupt offload.
//!
//! Runs a routine in interrupt context without a hardware interrupt. The
//! kernel's nesting depth for this CPU is raised before the routine is
//! called and lowered after it returns, so [`tessel_core::kernel::is_in_isr`]
//! reads `true` inside it.

use core::ffi::c_void;

use tessel_core::kernel::KERNEL;

/// Routine run by an IRQ offload.
pub type OffloadRoutine = fn(*const c_void);

/// Calls `routine(arg)` inside the interrupt nesting bracket.
pub fn run(routine: OffloadRoutine, arg: *const c_void) {
    let nested = KERNEL.nesting().enter();
    tessel_core::ktrace!(
        "irq offload {:p}({arg:p}) at depth {}",
        routine as *const (),
        nested.depth()
    );
    routine(arg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use tessel_core::kernel::is_in_isr;

    fn record_depth(arg: *const c_void) {
        let seen = unsafe { &*arg.cast::<AtomicU32>() };
        assert!(is_in_isr());
        seen.store(KERNEL.nesting().depth(), Ordering::SeqCst);
    }

    fn reoffload(arg: *const c_void) {
        run(record_depth, arg);
    }

    // The only test in this crate that enters the kernel's own counter.
    #[test]
    fn bracket_pairs_around_routine() {
        let seen = AtomicU32::new(0);
        let arg = (&raw const seen).cast::<c_void>();

        assert!(!is_in_isr());
        run(record_depth, arg);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!is_in_isr());

        run(reoffload, arg);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(KERNEL.nesting().depth(), 0);
    }
}
