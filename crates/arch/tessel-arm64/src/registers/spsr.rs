//! Saved Program Status Register values.

use bitflags::bitflags;

use super::ExceptionLevel;

bitflags! {
    /// SPSR_ELx as written before an exception return.
    ///
    /// Only the bits this kernel sets are named. `M[3:0]` (the target mode)
    /// is built with [`Spsr::for_level`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Spsr: u64 {
        /// Debug exception mask.
        const D = 1 << 9;
        /// SError mask.
        const A = 1 << 8;
        /// IRQ mask.
        const I = 1 << 7;
        /// FIQ mask.
        const F = 1 << 6;
        /// `M[0]`: use SP_ELx rather than SP_EL0.
        const SP_ELX = 1 << 0;
    }
}

impl Spsr {
    /// Mask covering `M[3:0]`.
    pub const MODE_MASK: u64 = 0xf;

    /// `ELxh` mode for `level`: return to that level on its own stack
    /// pointer, nothing masked.
    pub const fn for_level(level: ExceptionLevel) -> Self {
        Self::from_bits_retain(((level as u64) << 2) | Self::SP_ELX.bits())
    }

    /// The `M[3:0]` field.
    pub const fn mode(self) -> u64 {
        self.bits() & Self::MODE_MASK
    }

    /// Exception level encoded in `M[3:2]`, or `None` for EL0.
    pub const fn level(self) -> Option<ExceptionLevel> {
        ExceptionLevel::from_index(self.mode() >> 2)
    }
}
