//! Architecture-neutral kernel plumbing shared by the Tessel arch layers.
//!
//! Everything here is host-testable: the leveled kernel logger, the
//! fatal-error reporter seam, per-CPU storage and the kernel singleton that
//! carries the interrupt nesting depth. The AArch64 switch core in
//! `tessel-arm64` builds on these without pulling any of it into assembly.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod cpu_local;
pub mod fatal;
#[cfg(not(loom))]
pub mod kernel;
pub mod log;
pub mod macros;
pub mod nesting;

pub(crate) mod loom_compat;
