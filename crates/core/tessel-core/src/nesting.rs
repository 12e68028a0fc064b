//! Interrupt nesting depth.
//!
//! A [`NestingCounter`] records how many interrupt-equivalent contexts are
//! active on one CPU. Entering such a context goes through
//! [`NestingCounter::enter`], which returns a [`NestingGuard`]; the depth is
//! raised before `enter` returns and lowered when the guard drops, so no
//! return or unwind path can leave it raised.
//!
//! Updates are atomic read-modify-writes. The counter is therefore correct
//! whether it is shared by several cores or only by one core and its own
//! interrupt handlers.

use crate::loom_compat::{AtomicU32, Ordering};

/// Depth counter for one CPU.
#[derive(Debug)]
pub struct NestingCounter {
    depth: AtomicU32,
}

impl NestingCounter {
    /// Creates a counter at depth 0.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
        }
    }

    /// Creates a counter at depth 0.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
        }
    }

    /// Raises the depth by one and returns the guard that lowers it.
    #[must_use = "dropping the guard immediately leaves the nested context"]
    pub fn enter(&self) -> NestingGuard<'_> {
        let prev = self.depth.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev != u32::MAX, "interrupt nesting depth overflow");
        NestingGuard { counter: self }
    }

    /// Current depth.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    /// Returns `true` while at least one guard is alive.
    pub fn is_nested(&self) -> bool {
        self.depth() > 0
    }

    fn leave(&self) {
        let prev = self.depth.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev != 0, "interrupt nesting depth underflow");
    }
}

impl Default for NestingCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the owning [`NestingCounter`] raised while alive.
#[derive(Debug)]
pub struct NestingGuard<'a> {
    counter: &'a NestingCounter,
}

impl NestingGuard<'_> {
    /// Depth as seen from inside this guard's scope.
    pub fn depth(&self) -> u32 {
        self.counter.depth()
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.counter.leave();
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn starts_outside_interrupt_context() {
        let counter = NestingCounter::new();
        assert_eq!(counter.depth(), 0);
        assert!(!counter.is_nested());
    }

    #[test]
    fn guard_raises_then_restores() {
        let counter = NestingCounter::new();
        {
            let guard = counter.enter();
            assert_eq!(guard.depth(), 1);
            assert!(counter.is_nested());
        }
        assert_eq!(counter.depth(), 0);
    }

    #[test]
    fn nested_guards_stack() {
        let counter = NestingCounter::new();
        let outer = counter.enter();
        {
            let inner = counter.enter();
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(outer.depth(), 1);
        drop(outer);
        assert_eq!(counter.depth(), 0);
    }

    #[test]
    fn unwinding_still_lowers_depth() {
        let counter = NestingCounter::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = counter.enter();
            panic!("offloaded routine failed");
        }));
        assert!(result.is_err());
        assert_eq!(counter.depth(), 0);
    }

    #[test]
    fn many_sequential_entries_return_to_baseline() {
        let counter = NestingCounter::new();
        let _base = counter.enter();
        for _ in 0..1000 {
            let g = counter.enter();
            assert!(g.depth() > 1);
        }
        assert_eq!(counter.depth(), 1);
    }
}
