//! Compile-time configuration.
//!
//! Cargo features select optional machinery; everything else is a constant
//! here so that the assembly and the Rust side agree on one value.

use crate::registers::spsr::Spsr;

/// Supervisor-call immediate requesting a cooperative context switch.
pub const SVC_CONTEXT_SWITCH: u16 = 0;

/// Supervisor-call immediate requesting an IRQ offload.
pub const SVC_IRQ_OFFLOAD: u16 = 1;

/// Whether the IRQ-offload call is demultiplexed (`irq-offload` feature).
pub const IRQ_OFFLOAD: bool = cfg!(feature = "irq-offload");

/// Whether the switch primitive calls the instrumentation hooks
/// (`trace-switch` feature).
pub const TRACE_SWITCH: bool = cfg!(feature = "trace-switch");

pub use tessel_core::cpu_local::MAX_CPUS;

/// Exception mask bits a new thread starts with: FIQ masked, IRQ, SError
/// and debug exceptions left as the mode selects.
pub const NEW_THREAD_MASK: Spsr = Spsr::F;
