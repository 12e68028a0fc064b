//! Fatal-error reporting seam.
//!
//! Architecture code that hits a condition it cannot recover from calls
//! [`fatal_error`] with a [`FatalReason`] and a pointer to whatever saved
//! context it has (usually the exception frame). What happens next (halt,
//! reset, dump) belongs to the handler installed with [`set_fatal_handler`].
//! The default handler logs at fatal level and panics.

use core::ffi::c_void;
use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Why the kernel is going down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FatalReason {
    /// An exception the architecture layer could not handle.
    CpuException = 0,
    /// An interrupt with no registered handler.
    SpuriousIrq = 1,
    /// Stack canary check failed.
    StackCheckFail = 2,
    /// Recoverable kernel error escalated by the caller.
    KernelOops = 3,
    /// Unrecoverable kernel error.
    KernelPanic = 4,
}

impl FatalReason {
    /// Numeric code handed to the fatal handler.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Converts a numeric code back to a reason.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::CpuException),
            1 => Some(Self::SpuriousIrq),
            2 => Some(Self::StackCheckFail),
            3 => Some(Self::KernelOops),
            4 => Some(Self::KernelPanic),
            _ => None,
        }
    }
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CpuException => "unhandled CPU exception",
            Self::SpuriousIrq => "spurious interrupt",
            Self::StackCheckFail => "stack check failed",
            Self::KernelOops => "kernel oops",
            Self::KernelPanic => "kernel panic",
        };
        write!(f, "{text} (code {})", self.code())
    }
}

/// Signature of the installed fatal handler.
///
/// The second argument is the saved context of the failing code, or null.
pub type FatalHandler = fn(FatalReason, *const c_void) -> !;

fn default_handler(reason: FatalReason, context: *const c_void) -> ! {
    crate::kfatal!("{reason}, saved context at {context:p}");
    panic!("fatal error: {reason}");
}

static HANDLER: AtomicPtr<()> = AtomicPtr::new(default_handler as *mut ());

/// Installs the kernel's fatal handler.
///
/// # Safety
///
/// `handler` is entered from exception context with interrupts masked and
/// must not return.
pub unsafe fn set_fatal_handler(handler: FatalHandler) {
    HANDLER.store(handler as *mut (), Ordering::Release);
    crate::kdebug!("fatal handler installed at {:p}", handler as *const ());
}

/// Reports an unrecoverable condition. Never returns.
pub fn fatal_error(reason: FatalReason, context: *const c_void) -> ! {
    let ptr = HANDLER.load(Ordering::Acquire);
    // SAFETY: HANDLER only ever holds `default_handler` or a `FatalHandler`
    // stored by `set_fatal_handler`.
    let handler = unsafe { core::mem::transmute::<*mut (), FatalHandler>(ptr) };
    handler(reason, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..5 {
            let reason = FatalReason::from_code(code).unwrap();
            assert_eq!(reason.code(), code);
        }
        assert_eq!(FatalReason::from_code(5), None);
    }

    #[test]
    fn cpu_exception_is_code_zero() {
        assert_eq!(FatalReason::CpuException.code(), 0);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(
            FatalReason::CpuException.to_string(),
            "unhandled CPU exception (code 0)"
        );
    }

    #[test]
    #[should_panic(expected = "fatal error: unhandled CPU exception")]
    fn default_handler_panics() {
        fatal_error(FatalReason::CpuException, core::ptr::null());
    }
}
