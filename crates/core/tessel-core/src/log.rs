//! Leveled kernel logging.
//!
//! Messages go through [`klog!`] (or the `kfatal!` .. `ktrace!` shorthands)
//! to a single sink function registered with [`set_sink`]. Until a sink is
//! registered every message is dropped, so code in this crate may log from
//! the earliest boot stage without checking anything.
//!
//! [`set_max_level`] filters at runtime; the check happens before the
//! arguments are handed to the sink.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels, lower is more severe
// ---------------------------------------------------------------------------

/// Kernel log severity. Lower values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// The kernel is about to stop.
    Fatal = 0,
    /// An operation failed.
    Error = 1,
    /// Unexpected but survivable.
    Warn = 2,
    /// Progress messages.
    Info = 3,
    /// Diagnostics.
    Debug = 4,
    /// Per-event tracing.
    Trace = 5,
}

impl LogLevel {
    /// Fixed-width name used by sinks when prefixing a line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Converts a raw level, saturating unknown values to [`LogLevel::Trace`].
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Fatal,
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().trim_end())
    }
}

// ---------------------------------------------------------------------------
// Sink and runtime filter
// ---------------------------------------------------------------------------

/// Signature of the registered log sink.
pub type LogSink = fn(LogLevel, fmt::Arguments<'_>);

fn discard(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static SINK: AtomicPtr<()> = AtomicPtr::new(discard as *mut ());
static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);

/// Registers the function that receives every log message.
///
/// # Safety
///
/// `sink` is called from any context this crate logs from, including
/// exception handlers with interrupts masked. It must not block and must not
/// log recursively.
pub unsafe fn set_sink(sink: LogSink) {
    SINK.store(sink as *mut (), Ordering::Release);
}

/// Sets the most verbose level that still reaches the sink.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the current runtime filter.
pub fn max_level() -> LogLevel {
    LogLevel::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if a message at `level` would reach the sink.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

#[inline]
fn sink() -> LogSink {
    let ptr = SINK.load(Ordering::Acquire);
    // SAFETY: SINK only ever holds `discard` or a pointer stored by
    // `set_sink`, both of which are `LogSink` function pointers.
    unsafe { core::mem::transmute::<*mut (), LogSink>(ptr) }
}

/// Backend of [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        sink()(level, args);
    }
}

// ---------------------------------------------------------------------------
// klog! and convenience macros
// ---------------------------------------------------------------------------

/// Logs a formatted message at the given [`LogLevel`].
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs at [`LogLevel::Fatal`](crate::log::LogLevel::Fatal).
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Fatal, $($arg)*) };
}

/// Logs at [`LogLevel::Error`](crate::log::LogLevel::Error).
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs at [`LogLevel::Warn`](crate::log::LogLevel::Warn).
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs at [`LogLevel::Info`](crate::log::LogLevel::Info).
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs at [`LogLevel::Debug`](crate::log::LogLevel::Debug).
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs at [`LogLevel::Trace`](crate::log::LogLevel::Trace).
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Trace, $($arg)*) };
}
