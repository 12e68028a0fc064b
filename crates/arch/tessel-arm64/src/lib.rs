//! AArch64 thread switch core for the Tessel kernel.
//!
//! This crate owns the register-level half of a context switch: the
//! `switch::context_switch` primitive, the trampoline a new thread enters
//! through on its first dispatch, and the supervisor-call handler that lets
//! cooperative code request a switch or run a routine in interrupt context.
//! Which thread runs next is the scheduler's business, not ours.
//!
//! Assembly is only compiled for `target_arch = "aarch64"`. Layouts, syndrome
//! decoding, call classification and the offload bracket build and test on
//! any host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod entry;
pub mod frame;
#[cfg(feature = "irq-offload")]
pub mod offload;
pub mod registers;
pub mod svc;
#[cfg(target_arch = "aarch64")]
pub mod switch;
pub mod trace;
