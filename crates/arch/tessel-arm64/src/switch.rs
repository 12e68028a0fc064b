//! The context switch primitive.
//!
//! [`context_switch`] is reached two ways: from the supervisor-call handler
//! for a cooperative switch, and from the interrupt exit path for a
//! preemptive one. Both pass the incoming context and the outgoing thread's
//! switch-handle slot. Either way the caller has already saved the
//! caller-saved registers of the outgoing thread on its stack, so only the
//! callee-saved set and `sp` move here. The literal offsets below are pinned
//! in `context.rs`.

use core::ffi::c_void;

use crate::context::{SWITCH_HANDLE_OFFSET, ThreadContext};

/// Stores `x19`..`x30` and `sp` into `[x1]`, then loads the same set from
/// `[x0]` and installs the new `sp`. Every store precedes every load.
macro_rules! transplant_callee_saved {
    () => {
        concat!(
            "stp x19, x20, [x1, #0x00]\n",
            "stp x21, x22, [x1, #0x10]\n",
            "stp x23, x24, [x1, #0x20]\n",
            "stp x25, x26, [x1, #0x30]\n",
            "stp x27, x28, [x1, #0x40]\n",
            "stp x29, x30, [x1, #0x50]\n",
            "mov x9, sp\n",
            "str x9, [x1, #0x60]\n",
            "ldp x19, x20, [x0, #0x00]\n",
            "ldp x21, x22, [x0, #0x10]\n",
            "ldp x23, x24, [x0, #0x20]\n",
            "ldp x25, x26, [x0, #0x30]\n",
            "ldp x27, x28, [x0, #0x40]\n",
            "ldp x29, x30, [x0, #0x50]\n",
            "ldr x9, [x0, #0x60]\n",
            "mov sp, x9\n",
        )
    };
}

/// Suspends the thread whose switch-handle slot is `old_slot` and resumes
/// the one owning `new`.
///
/// The outgoing context is found by subtracting
/// [`SWITCH_HANDLE_OFFSET`] from `old_slot`. Returns, from the caller's point
/// of view, when some later switch names this thread as its `new`. The
/// resumed thread continues at its saved `x30` with `x0` holding `new` and
/// `x1` the outgoing context (not its slot).
///
/// # Safety
///
/// - `new` must be a valid `ThreadContext` holding state saved by a previous
///   switch or built by
///   [`prepare_new_thread`](crate::entry::prepare_new_thread).
/// - `old_slot` must be the `switch_handle` field of a different, valid
///   `ThreadContext` ([`ThreadContext::handle_slot`]).
/// - The caller must have saved every caller-saved register it needs.
#[cfg(not(feature = "trace-switch"))]
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(new: *mut ThreadContext, old_slot: *mut *mut c_void) {
    core::arch::naked_asm!(
        "sub x1, x1, #{handle}",
        transplant_callee_saved!(),
        "ret",
        handle = const SWITCH_HANDLE_OFFSET,
    );
}

/// Suspends the thread whose switch-handle slot is `old_slot` and resumes
/// the one owning `new`.
///
/// The registered switch hooks run before the save and after the load;
/// `x0`, `x1` and `x30` survive both calls.
///
/// # Safety
///
/// - `new` must be a valid `ThreadContext` holding state saved by a previous
///   switch or built by
///   [`prepare_new_thread`](crate::entry::prepare_new_thread).
/// - `old_slot` must be the `switch_handle` field of a different, valid
///   `ThreadContext` ([`ThreadContext::handle_slot`]).
/// - The caller must have saved every caller-saved register it needs.
#[cfg(feature = "trace-switch")]
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(new: *mut ThreadContext, old_slot: *mut *mut c_void) {
    core::arch::naked_asm!(
        "sub x1, x1, #{handle}",

        "stp x0, x1, [sp, #-16]!",
        "str x30, [sp, #-16]!",
        "mov x0, x1",
        "bl {switched_out}",
        "ldr x30, [sp], #16",
        "ldp x0, x1, [sp], #16",

        transplant_callee_saved!(),

        // Now on the incoming thread's stack.
        "stp x0, x1, [sp, #-16]!",
        "str x30, [sp, #-16]!",
        "bl {switched_in}",
        "ldr x30, [sp], #16",
        "ldp x0, x1, [sp], #16",
        "ret",

        handle = const SWITCH_HANDLE_OFFSET,
        switched_out = sym crate::trace::notify_switched_out,
        switched_in = sym crate::trace::notify_switched_in,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    /// A context followed by the register values its landing pad observed.
    #[repr(C)]
    struct Observed {
        ctx: ThreadContext,
        seen: [u64; 10],
    }

    /// First code of the second thread: records `x19`..`x28` next to its
    /// context (`x0`) and switches straight back to `x1`, naming its own
    /// handle slot as the outgoing one.
    #[unsafe(naked)]
    unsafe extern "C" fn landing() {
        core::arch::naked_asm!(
            "add x9, x0, #{seen}",
            "stp x19, x20, [x9, #0x00]",
            "stp x21, x22, [x9, #0x10]",
            "stp x23, x24, [x9, #0x20]",
            "stp x25, x26, [x9, #0x30]",
            "stp x27, x28, [x9, #0x40]",
            "add x9, x0, #{handle}",
            "mov x0, x1",
            "mov x1, x9",
            "b {switch}",
            seen = const offset_of!(Observed, seen),
            handle = const SWITCH_HANDLE_OFFSET,
            switch = sym context_switch,
        );
    }

    #[repr(C, align(16))]
    struct Stack([u8; 16 * 1024]);

    const PATTERN: [u64; 10] = [
        0x1919_1919_1919_1919,
        0x2020_2020_2020_2020,
        0x2121_2121_2121_2121,
        0x2222_2222_2222_2222,
        0x2323_2323_2323_2323,
        0x2424_2424_2424_2424,
        0x2525_2525_2525_2525,
        0x2626_2626_2626_2626,
        0x2727_2727_2727_2727,
        0x2828_2828_2828_2828,
    ];

    #[test]
    fn round_trip_preserves_callee_saved_bits() {
        let mut stack = Box::new(Stack([0; 16 * 1024]));
        let top = stack.0.as_mut_ptr_range().end as u64;

        let mut other = Observed {
            ctx: ThreadContext::new(),
            seen: [0; 10],
        };
        let regs = &mut other.ctx.callee_saved;
        [
            regs.x19, regs.x20, regs.x21, regs.x22, regs.x23, regs.x24, regs.x25, regs.x26,
            regs.x27, regs.x28,
        ] = PATTERN;
        regs.x30 = landing as usize as u64;
        regs.sp = top;
        let handle_after_main = core::ptr::without_provenance_mut::<c_void>(0xdead_0000);

        let mut main = ThreadContext::new();
        main.switch_handle = handle_after_main;
        let main_slot = main.handle_slot();
        unsafe { context_switch(&raw mut other.ctx, main_slot) };

        // Loaded bit-identically into the second thread...
        assert_eq!(other.seen, PATTERN);
        // ...and saved back bit-identically, at the context that owns the
        // slot it named, when it switched away.
        let back = other.ctx.callee_saved;
        assert_eq!(
            [
                back.x19, back.x20, back.x21, back.x22, back.x23, back.x24, back.x25, back.x26,
                back.x27, back.x28,
            ],
            PATTERN
        );
        assert_eq!(back.sp, top);
        assert_eq!(back.x30, landing as usize as u64);
        // The main thread's resume state went into its own callee-saved
        // area, not over the handle slot it passed.
        assert_ne!(main.callee_saved.sp, 0);
        assert_ne!(main.callee_saved.x30, 0);
        assert_eq!(main.switch_handle, handle_after_main);
    }
}
