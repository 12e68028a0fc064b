//! First dispatch of a new thread.
//!
//! [`prepare_new_thread`] lays out a thread so that the switch primitive's
//! `ret` lands in [`thread_entry_trampoline`] with `sp` on an [`EntryFrame`].
//! The trampoline turns that frame into an exception return: `SPSR_ELx` and
//! `ELR_ELx` of the level we run at get the frame's status and start
//! routine, `x0`..`x3` get the entry function and its arguments, and `eret`
//! drops into the start routine with the frame popped.

use tessel_core::assert_unsafe_precondition;

use crate::config::NEW_THREAD_MASK;
use crate::context::{CalleeSaved, ThreadContext};
use crate::frame::{ENTRY_FRAME_SIZE, EntryFrame};
use crate::registers::spsr::Spsr;
use crate::registers::{BankedRegisters, ExceptionLevel};

/// Start routine a new thread returns into. Receives the entry function and
/// its three arguments in `x0`..`x3` and never returns.
pub type ThreadStart = unsafe extern "C" fn(usize, usize, usize, usize) -> !;

/// Writes the frame's status and return address into the bank of the level
/// `regs` is executing at.
///
/// # Safety
///
/// Overwrites the pending exception return state of the current level.
/// Nothing may take an exception between this and the `eret` that consumes
/// it.
pub unsafe fn install_return_state<R: BankedRegisters>(regs: &mut R, frame: &EntryFrame) {
    let el = regs.current_el();
    unsafe {
        regs.write_spsr(el, frame.spsr);
        regs.write_elr(el, frame.elr);
    }
}

#[cfg(target_arch = "aarch64")]
extern "C" fn restore_entry_state(frame: *const EntryFrame) {
    // SAFETY: called only from the trampoline, with `frame` at `sp` and
    // exceptions masked by the switch path that got us here.
    unsafe { install_return_state(&mut crate::registers::Hardware, &*frame) }
}

/// Resume address of a thread that has never run.
///
/// # Safety
///
/// Only reachable as the `ret` target of a switch into a context built by
/// [`prepare_new_thread`]. Must run with IRQs masked, as it is on every
/// switch path.
#[cfg(target_arch = "aarch64")]
#[unsafe(naked)]
pub unsafe extern "C" fn thread_entry_trampoline() -> ! {
    core::arch::naked_asm!(
        // Status and return address into the current level's bank.
        "mov x0, sp",
        "bl {restore}",

        // Entry function and arguments.
        "ldp x0, x1, [sp, #{args}]",
        "ldp x2, x3, [sp, #{args_hi}]",
        "add sp, sp, #{size}",
        "eret",

        restore = sym restore_entry_state,
        args = const crate::frame::ENTRY_ARGS_OFFSET,
        args_hi = const crate::frame::ENTRY_ARGS_OFFSET + 16,
        size = const ENTRY_FRAME_SIZE,
    );
}

/// Host builds never enter threads; this keeps the resume address of a
/// prepared context resolvable.
///
/// # Safety
///
/// Never to be called. It panics if it is.
#[cfg(not(target_arch = "aarch64"))]
pub unsafe extern "C" fn thread_entry_trampoline() -> ! {
    unreachable!("threads can only be entered on aarch64")
}

/// Builds the initial state of a thread in `ctx` and on its stack.
///
/// The [`EntryFrame`] goes at `stack_top` rounded down to 16 bytes. The
/// thread will `eret` into `start` at `level` (on that level's own stack
/// pointer, FIQ masked) with `x0 = entry` and `x1`..`x3 = args`. On return
/// `ctx` is marked ready and the frame's address is returned.
///
/// # Safety
///
/// - `stack_top` must be the one-past-the-end pointer of a writable stack
///   with room for at least [`ENTRY_FRAME_SIZE`] bytes plus alignment.
/// - `level` must be the level the kernel runs at when the thread is first
///   switched to.
pub unsafe fn prepare_new_thread(
    ctx: &mut ThreadContext,
    stack_top: *mut u8,
    start: ThreadStart,
    entry: usize,
    args: [usize; 3],
    level: ExceptionLevel,
) -> *mut EntryFrame {
    let misalign = stack_top.addr() % 16;
    assert_unsafe_precondition!(
        stack_top.addr() >= misalign + ENTRY_FRAME_SIZE,
        "stack top {stack_top:p} leaves no room for the entry frame"
    );

    // SAFETY: caller guarantees the stack below `stack_top` is writable and
    // large enough.
    let frame = unsafe { stack_top.sub(misalign + ENTRY_FRAME_SIZE) }.cast::<EntryFrame>();
    unsafe {
        frame.write(EntryFrame {
            spsr: (Spsr::for_level(level) | NEW_THREAD_MASK).bits(),
            elr: start as usize as u64,
            entry: entry as u64,
            arg1: args[0] as u64,
            arg2: args[1] as u64,
            arg3: args[2] as u64,
        });
    }

    ctx.callee_saved = CalleeSaved {
        x30: thread_entry_trampoline as usize as u64,
        sp: frame.addr() as u64,
        ..CalleeSaved::default()
    };
    ctx.mark_ready();

    tessel_core::ktrace!(
        "thread context {:p}: entry frame at {:p}, {:?}",
        core::ptr::from_mut(ctx),
        frame,
        level
    );
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::mock::MockRegisters;

    unsafe extern "C" fn start(_entry: usize, _a1: usize, _a2: usize, _a3: usize) -> ! {
        unreachable!()
    }

    #[repr(C, align(16))]
    struct Stack([u8; 256]);

    #[test]
    fn frame_sits_at_aligned_top() {
        let mut stack = Box::new(Stack([0; 256]));
        // Deliberately misaligned top.
        let top = unsafe { stack.0.as_mut_ptr().add(256 - 8) };
        let mut ctx = ThreadContext::new();

        let frame = unsafe {
            prepare_new_thread(&mut ctx, top, start, 0xaaaa, [1, 2, 3], ExceptionLevel::El1)
        };

        assert_eq!(frame.addr() % 16, 0);
        assert_eq!(frame.addr() + ENTRY_FRAME_SIZE, top.addr() - 8);
        let frame = unsafe { frame.read() };
        assert_eq!(
            frame,
            EntryFrame {
                spsr: 0x45,
                elr: start as usize as u64,
                entry: 0xaaaa,
                arg1: 1,
                arg2: 2,
                arg3: 3,
            }
        );
    }

    #[test]
    fn context_resumes_in_trampoline() {
        let mut stack = Box::new(Stack([0; 256]));
        let top = stack.0.as_mut_ptr_range().end;
        let mut ctx = ThreadContext::new();

        let frame = unsafe {
            prepare_new_thread(&mut ctx, top, start, 0, [0; 3], ExceptionLevel::El1)
        };

        let regs = ctx.callee_saved;
        assert_eq!(regs.x30, thread_entry_trampoline as usize as u64);
        assert_eq!(regs.sp, frame.addr() as u64);
        assert_eq!(regs.x19, 0);
        assert_eq!(regs.x29, 0);
        let handle = ctx.switch_handle;
        assert_eq!(handle, (&raw mut ctx).cast::<core::ffi::c_void>());
    }

    #[test]
    fn target_level_selects_mode() {
        let mut stack = Box::new(Stack([0; 256]));
        let top = stack.0.as_mut_ptr_range().end;
        let mut ctx = ThreadContext::new();

        let frame = unsafe {
            prepare_new_thread(&mut ctx, top, start, 0, [0; 3], ExceptionLevel::El2)
        };
        let spsr = Spsr::from_bits_retain(unsafe { frame.read() }.spsr);
        assert_eq!(spsr.level(), Some(ExceptionLevel::El2));
        assert!(spsr.contains(Spsr::F | Spsr::SP_ELX));
        assert!(!spsr.contains(Spsr::I));
    }

    #[test]
    fn return_state_goes_to_current_bank_only() {
        let frame = EntryFrame {
            spsr: 0x3c5,
            elr: 0x8000_1000,
            ..EntryFrame::default()
        };
        for level in [ExceptionLevel::El1, ExceptionLevel::El2, ExceptionLevel::El3] {
            let mut regs = MockRegisters::at(level);
            unsafe { install_return_state(&mut regs, &frame) };

            for other in 1..4 {
                if other == level as usize {
                    assert_eq!(regs.spsr[other], Some(0x3c5));
                    assert_eq!(regs.elr[other], Some(0x8000_1000));
                } else {
                    assert_eq!(regs.spsr[other], None, "{level:?} touched EL{other} SPSR");
                    assert_eq!(regs.elr[other], None, "{level:?} touched EL{other} ELR");
                }
            }
        }
    }
}
