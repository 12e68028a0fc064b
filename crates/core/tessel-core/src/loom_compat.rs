//! Atomics that switch to loom's model-checked versions under `cfg(loom)`.
//!
//! Only the types the nesting counter needs are re-exported.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU32, Ordering};
