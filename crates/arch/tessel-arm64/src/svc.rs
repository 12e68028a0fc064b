//! Supervisor-call handling.
//!
//! The trap-entry sequence (outside this crate) pushes an [`ExceptionFrame`]
//! and calls `handle_svc`. The handler checks that the exception really is
//! an `SVC`, then demultiplexes on its immediate:
//!
//! | Immediate | Call |
//! |-----------|------|
//! | [`SVC_CONTEXT_SWITCH`] | cooperative switch, `x0` = incoming handle, `x1` = outgoing handle slot |
//! | [`SVC_IRQ_OFFLOAD`](crate::config::SVC_IRQ_OFFLOAD) | run `x0(x1)` in interrupt context (`irq-offload` feature) |
//!
//! Anything else is a CPU exception and goes to the fatal handler.
//! `switch` and `irq_offload` are the calling side.

use core::ffi::c_void;
use core::fmt;

use tessel_core::fatal::FatalReason;

#[cfg(feature = "irq-offload")]
use crate::config::SVC_IRQ_OFFLOAD;
use crate::config::SVC_CONTEXT_SWITCH;
use crate::context::ThreadContext;
use crate::frame::ExceptionFrame;
use crate::registers::BankedRegisters;
use crate::registers::esr::{ExceptionClass, Syndrome};

/// A supervisor call decoded from the syndrome and the trapped registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvcCall {
    /// Switch from the thread whose handle slot is `old_slot` to `new`.
    ContextSwitch {
        /// Incoming thread's handle.
        new: *mut ThreadContext,
        /// Outgoing thread's handle slot.
        old_slot: *mut *mut c_void,
    },
    /// Call `routine(arg)` inside the interrupt nesting bracket.
    #[cfg(feature = "irq-offload")]
    IrqOffload {
        /// Address of an [`OffloadRoutine`](crate::offload::OffloadRoutine).
        routine: *const (),
        /// Its argument.
        arg: *const c_void,
    },
}

/// Why a trap could not be handled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuException {
    /// The exception class was not `SVC` from AArch64.
    NotSupervisorCall {
        /// Class that was reported.
        class: ExceptionClass,
    },
    /// `SVC` with an immediate nobody handles.
    UnknownCall {
        /// The 16-bit immediate.
        imm: u16,
    },
    /// IRQ offload with a null routine.
    NullRoutine,
}

impl CpuException {
    /// Reason passed to the fatal handler.
    pub const fn reason(self) -> FatalReason {
        FatalReason::CpuException
    }
}

impl fmt::Display for CpuException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupervisorCall { class } => {
                write!(f, "exception class {:#04x} is not a supervisor call", class.bits())
            }
            Self::UnknownCall { imm } => write!(f, "unknown supervisor call #{imm}"),
            Self::NullRoutine => f.write_str("irq offload of a null routine"),
        }
    }
}

/// Decodes a trap into the call it requests.
///
/// Only the exception class and the full 16-bit immediate are looked at;
/// exactly one immediate maps to each call.
pub fn classify(syndrome: Syndrome, frame: &ExceptionFrame) -> Result<SvcCall, CpuException> {
    let class = syndrome.class();
    if class != ExceptionClass::SvcAarch64 {
        return Err(CpuException::NotSupervisorCall { class });
    }

    match syndrome.call_immediate() {
        SVC_CONTEXT_SWITCH => Ok(SvcCall::ContextSwitch {
            new: core::ptr::with_exposed_provenance_mut(frame.arg(0) as usize),
            old_slot: core::ptr::with_exposed_provenance_mut(frame.arg(1) as usize),
        }),
        #[cfg(feature = "irq-offload")]
        SVC_IRQ_OFFLOAD => {
            let routine = core::ptr::with_exposed_provenance::<()>(frame.arg(0) as usize);
            if routine.is_null() {
                return Err(CpuException::NullRoutine);
            }
            Ok(SvcCall::IrqOffload {
                routine,
                arg: core::ptr::with_exposed_provenance(frame.arg(1) as usize),
            })
        }
        imm => Err(CpuException::UnknownCall { imm }),
    }
}

/// Signature of the switch primitive, as [`handle_trap`] calls it.
pub type SwitchFn = unsafe extern "C" fn(*mut ThreadContext, *mut *mut c_void);

/// Reads the syndrome from the bank of the level `regs` executes at and
/// decodes the trap described by it and `frame`.
pub fn decode_trap<R: BankedRegisters>(
    regs: &R,
    frame: &ExceptionFrame,
) -> Result<SvcCall, CpuException> {
    let syndrome = Syndrome::new(regs.read_esr(regs.current_el()));
    classify(syndrome, frame).inspect_err(|err| {
        tessel_core::kerr!("{err} ({syndrome:?})");
    })
}

/// Decodes the current trap and carries it out: a switch through `switch`,
/// an offload inside the nesting bracket, or a report to the fatal handler.
///
/// # Safety
///
/// `frame` must be the live frame of the current trap. `switch` must follow
/// the contract of the switch primitive.
pub unsafe fn handle_trap<R: BankedRegisters>(
    regs: &R,
    frame: *mut ExceptionFrame,
    switch: SwitchFn,
) {
    // SAFETY: caller passes the frame of the trap being handled.
    let call = match decode_trap(regs, unsafe { &*frame }) {
        Ok(call) => call,
        Err(err) => tessel_core::fatal::fatal_error(err.reason(), frame.cast_const().cast()),
    };

    match call {
        SvcCall::ContextSwitch { new, old_slot } => {
            // SAFETY: the caller of `switch` passed a ready handle and its own
            // handle slot.
            unsafe { switch(new, old_slot) };
        }
        #[cfg(feature = "irq-offload")]
        SvcCall::IrqOffload { routine, arg } => {
            // SAFETY: `irq_offload` only issues the call with an
            // `OffloadRoutine` in x0, and `classify` rejected null.
            let routine = unsafe {
                core::mem::transmute::<*const (), crate::offload::OffloadRoutine>(routine)
            };
            crate::offload::run(routine, arg);
        }
    }
}

/// Supervisor-call handler, called by the trap-entry sequence with the frame
/// it pushed. Returns to the trap-exit sequence, possibly on another thread's
/// behalf first.
///
/// # Safety
///
/// `frame` must be the live frame of the current trap, and the CPU must be
/// handling a synchronous exception at the level it executes at.
#[cfg(target_arch = "aarch64")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn handle_svc(frame: *mut ExceptionFrame) {
    unsafe { handle_trap(&crate::registers::Hardware, frame, crate::switch::context_switch) }
}

/// Cooperatively switches from the calling thread to `new_handle`.
///
/// Returns when another switch resumes the caller.
///
/// # Safety
///
/// - `new_handle` must be the switch handle of a ready thread.
/// - `old_slot` must be the caller's own handle slot
///   ([`ThreadContext::handle_slot`]).
#[cfg(target_arch = "aarch64")]
pub unsafe fn switch(new_handle: *mut c_void, old_slot: *mut *mut c_void) {
    unsafe {
        core::arch::asm!(
            "svc #{imm}",
            imm = const SVC_CONTEXT_SWITCH,
            in("x0") new_handle,
            in("x1") old_slot,
            clobber_abi("C"),
        );
    }
}

/// Runs `routine(arg)` in interrupt context on this CPU.
#[cfg(all(target_arch = "aarch64", feature = "irq-offload"))]
pub fn irq_offload(routine: crate::offload::OffloadRoutine, arg: *const c_void) {
    // SAFETY: the handler reads x0/x1 back out of the frame and calls the
    // routine; all caller-saved state is declared clobbered.
    unsafe {
        core::arch::asm!(
            "svc #{imm}",
            imm = const SVC_IRQ_OFFLOAD,
            in("x0") routine as usize,
            in("x1") arg,
            clobber_abi("C"),
        );
    }
}
