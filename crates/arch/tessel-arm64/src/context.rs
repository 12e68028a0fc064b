//! Per-thread saved register state.
//!
//! A [`ThreadContext`] is the architecture part of a thread control block.
//! The switch primitive addresses it from assembly, so its layout is fixed,
//! versioned by [`CONTEXT_LAYOUT_VERSION`] and pinned by the `static_assert!`s
//! at the bottom of this file. Change one and the other must follow.

use core::ffi::c_void;
use core::mem::{offset_of, size_of};

use tessel_core::static_assert;

/// Bumped whenever a field of [`CalleeSaved`] or [`ThreadContext`] moves.
pub const CONTEXT_LAYOUT_VERSION: u32 = 1;

/// Registers the AAPCS64 requires a callee to preserve, plus the stack
/// pointer.
///
/// While a thread is switched out this is exactly the state it resumes from:
/// `sp` is installed, then execution continues at `x30`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CalleeSaved {
    pub x19: u64,
    pub x20: u64,
    pub x21: u64,
    pub x22: u64,
    pub x23: u64,
    pub x24: u64,
    pub x25: u64,
    pub x26: u64,
    pub x27: u64,
    pub x28: u64,
    /// Frame pointer.
    pub x29: u64,
    /// Link register; the resume address.
    pub x30: u64,
    pub sp: u64,
}

/// Architecture state of one thread.
#[repr(C)]
#[derive(Debug)]
pub struct ThreadContext {
    /// Saved registers, written by the switch primitive.
    pub callee_saved: CalleeSaved,
    /// Opaque handle the scheduler passes to a switch. A thread that is ready
    /// to be switched to holds its own context address here.
    pub switch_handle: *mut c_void,
}

impl ThreadContext {
    /// A zeroed context with a null handle.
    pub const fn new() -> Self {
        Self {
            callee_saved: CalleeSaved {
                x19: 0,
                x20: 0,
                x21: 0,
                x22: 0,
                x23: 0,
                x24: 0,
                x25: 0,
                x26: 0,
                x27: 0,
                x28: 0,
                x29: 0,
                x30: 0,
                sp: 0,
            },
            switch_handle: core::ptr::null_mut(),
        }
    }

    /// Publishes this context as a switch target.
    pub fn mark_ready(&mut self) {
        self.switch_handle = core::ptr::from_mut(self).cast();
    }

    /// Address of the handle slot, as passed to a switch for the outgoing
    /// thread.
    pub fn handle_slot(&mut self) -> *mut *mut c_void {
        &raw mut self.switch_handle
    }

    /// Recovers the context that embeds the handle slot `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must point at the `switch_handle` field of a live
    /// `ThreadContext`.
    pub unsafe fn from_handle_slot(slot: *mut *mut c_void) -> *mut Self {
        // SAFETY: caller guarantees the slot lives SWITCH_HANDLE_OFFSET bytes
        // into a ThreadContext.
        unsafe { slot.byte_sub(SWITCH_HANDLE_OFFSET).cast() }
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset of [`ThreadContext::callee_saved`].
pub const CALLEE_SAVED_OFFSET: usize = offset_of!(ThreadContext, callee_saved);
/// Offset of [`ThreadContext::switch_handle`].
pub const SWITCH_HANDLE_OFFSET: usize = offset_of!(ThreadContext, switch_handle);

/// Offsets the switch assembly stores to, relative to a `ThreadContext`.
pub mod offsets {
    use super::{CALLEE_SAVED_OFFSET, CalleeSaved};
    use core::mem::offset_of;

    /// `x19`/`x20` pair.
    pub const X19: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x19);
    /// `x21`/`x22` pair.
    pub const X21: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x21);
    /// `x23`/`x24` pair.
    pub const X23: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x23);
    /// `x25`/`x26` pair.
    pub const X25: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x25);
    /// `x27`/`x28` pair.
    pub const X27: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x27);
    /// `x29`/`x30` pair.
    pub const X29: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, x29);
    /// Stack pointer.
    pub const SP: usize = CALLEE_SAVED_OFFSET + offset_of!(CalleeSaved, sp);
}

static_assert!(size_of::<CalleeSaved>() == 13 * 8);
static_assert!(CALLEE_SAVED_OFFSET == 0);
static_assert!(SWITCH_HANDLE_OFFSET == 0x68);
// The assembly uses these literal offsets with ldp/stp pairs.
static_assert!(offsets::X19 == 0x00);
static_assert!(offsets::X21 == 0x10);
static_assert!(offsets::X23 == 0x20);
static_assert!(offsets::X25 == 0x30);
static_assert!(offsets::X27 == 0x40);
static_assert!(offsets::X29 == 0x50);
static_assert!(offsets::SP == 0x60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_zeroed() {
        let ctx = ThreadContext::new();
        assert_eq!(ctx.callee_saved, CalleeSaved::default());
        assert!(ctx.switch_handle.is_null());
    }

    #[test]
    fn mark_ready_points_handle_at_self() {
        let mut ctx = ThreadContext::new();
        ctx.mark_ready();
        let handle = ctx.switch_handle;
        assert_eq!(handle, (&raw mut ctx).cast::<c_void>());
    }

    #[test]
    fn handle_slot_recovers_owner() {
        let mut ctx = ThreadContext::new();
        let owner = &raw mut ctx;
        let slot = ctx.handle_slot();
        let recovered = unsafe { ThreadContext::from_handle_slot(slot) };
        assert_eq!(recovered, owner);
    }

    #[test]
    fn layout_is_versioned() {
        assert_eq!(CONTEXT_LAYOUT_VERSION, 1);
        assert_eq!(size_of::<ThreadContext>(), 14 * 8);
    }

    #[test]
    fn slot_minus_handle_offset_spans_callee_saved_area() {
        // The switch primitive receives the handle slot and saves
        // `size_of::<CalleeSaved>()` bytes at `slot - SWITCH_HANDLE_OFFSET`.
        let mut ctx = ThreadContext::new();
        let start = (&raw const ctx).addr();
        let end = start + size_of::<ThreadContext>();
        let save_at = ctx.handle_slot().addr() - SWITCH_HANDLE_OFFSET;

        assert_eq!(save_at, start + CALLEE_SAVED_OFFSET);
        assert!(save_at + size_of::<CalleeSaved>() <= end);
        assert!(save_at + offsets::SP + 8 <= ctx.handle_slot().addr());
    }
}
