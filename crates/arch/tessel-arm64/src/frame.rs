//! Stack frames shared with assembly.
//!
//! [`ExceptionFrame`] is what the trap-entry sequence leaves on the stack
//! before calling the supervisor-call handler; [`EntryFrame`] is what a new
//! thread's stack holds until its first dispatch.

use core::mem::{offset_of, size_of};

use tessel_core::static_assert;

/// Caller-saved state pushed by the trap-entry sequence.
///
/// The callee-saved registers are not here: the handler preserves them
/// itself, or hands them to the switch primitive on a switch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionFrame {
    /// `x0`..`x18` at the time of the trap.
    pub x: [u64; 19],
    /// Link register.
    pub x30: u64,
    /// `SPSR_ELx` of the trapped context.
    pub spsr: u64,
    /// `ELR_ELx` of the trapped context.
    pub elr: u64,
}

impl ExceptionFrame {
    /// Argument register `x{n}` at the time of the trap.
    ///
    /// # Panics
    ///
    /// Panics if `n > 18`.
    #[inline]
    pub fn arg(&self, n: usize) -> u64 {
        self.x[n]
    }
}

/// State a new thread consumes on its first dispatch.
///
/// Sits at the 16-byte-aligned top of the thread stack, pointed to by the
/// saved `sp`. The entry trampoline loads it and pops it before `eret`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFrame {
    /// Saved program status for the exception return.
    pub spsr: u64,
    /// Exception return address: the thread start routine.
    pub elr: u64,
    /// Thread entry function, handed over in `x0`.
    pub entry: u64,
    /// First argument, in `x1`.
    pub arg1: u64,
    /// Second argument, in `x2`.
    pub arg2: u64,
    /// Third argument, in `x3`.
    pub arg3: u64,
}

/// Size of [`ExceptionFrame`] in bytes.
pub const EXCEPTION_FRAME_SIZE: usize = size_of::<ExceptionFrame>();
/// Size of [`EntryFrame`] in bytes.
pub const ENTRY_FRAME_SIZE: usize = size_of::<EntryFrame>();
/// Offset of [`EntryFrame::entry`]; `x0`..`x3` are loaded from here.
pub const ENTRY_ARGS_OFFSET: usize = offset_of!(EntryFrame, entry);

static_assert!(EXCEPTION_FRAME_SIZE == 22 * 8);
static_assert!(EXCEPTION_FRAME_SIZE % 16 == 0, "exception frame must keep sp aligned");
static_assert!(offset_of!(ExceptionFrame, x30) == 19 * 8);
static_assert!(offset_of!(ExceptionFrame, spsr) == 20 * 8);
static_assert!(offset_of!(ExceptionFrame, elr) == 21 * 8);
static_assert!(ENTRY_FRAME_SIZE == 6 * 8);
static_assert!(ENTRY_FRAME_SIZE % 16 == 0, "entry frame must keep sp aligned");
static_assert!(offset_of!(EntryFrame, elr) == 8);
static_assert!(ENTRY_ARGS_OFFSET == 0x10);
