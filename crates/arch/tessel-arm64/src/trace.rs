//! Context-switch instrumentation hooks.
//!
//! With the `trace-switch` feature the switch primitive calls
//! [`notify_switched_out`] before it saves the outgoing thread and
//! [`notify_switched_in`] after it loads the incoming one. Both forward to
//! whatever was registered with [`set_switch_hooks`]; the default hooks do
//! nothing.

use core::sync::atomic::{AtomicPtr, Ordering};

use crate::context::ThreadContext;

/// Hook invoked with the context being switched out or in.
///
/// Runs in the middle of a switch: no locks, no logging, no switching.
pub type SwitchHook = fn(*mut ThreadContext);

fn ignore(_ctx: *mut ThreadContext) {}

static SWITCHED_OUT: AtomicPtr<()> = AtomicPtr::new(ignore as *mut ());
static SWITCHED_IN: AtomicPtr<()> = AtomicPtr::new(ignore as *mut ());

/// Registers the pair of switch hooks.
///
/// # Safety
///
/// Both hooks are called from the switch primitive, between the outgoing
/// thread's last instruction and the incoming thread's first. They must not
/// block, switch or touch the callee-saved area of either context.
pub unsafe fn set_switch_hooks(switched_out: SwitchHook, switched_in: SwitchHook) {
    SWITCHED_OUT.store(switched_out as *mut (), Ordering::Release);
    SWITCHED_IN.store(switched_in as *mut (), Ordering::Release);
    tessel_core::kdebug!(
        "switch hooks installed (out {:p}, in {:p})",
        switched_out as *const (),
        switched_in as *const ()
    );
}

/// Restores the no-op hooks.
pub fn clear_switch_hooks() {
    SWITCHED_OUT.store(ignore as *mut (), Ordering::Release);
    SWITCHED_IN.store(ignore as *mut (), Ordering::Release);
}

#[inline]
fn load(slot: &AtomicPtr<()>) -> SwitchHook {
    // SAFETY: both slots only ever hold `ignore` or a `SwitchHook` stored by
    // `set_switch_hooks`.
    unsafe { core::mem::transmute::<*mut (), SwitchHook>(slot.load(Ordering::Acquire)) }
}

/// Calls the registered "switched out" hook. Called by the switch primitive
/// with the outgoing context.
pub extern "C" fn notify_switched_out(old: *mut ThreadContext) {
    load(&SWITCHED_OUT)(old);
}

/// Calls the registered "switched in" hook. Called by the switch primitive
/// with the incoming context.
pub extern "C" fn notify_switched_in(new: *mut ThreadContext) {
    load(&SWITCHED_IN)(new);
}
