//! Per-CPU storage indexed by the executing core.
//!
//! [`CpuLocal`] holds one `T` per possible CPU. On bare-metal AArch64 the
//! slot index comes from `MPIDR_EL1` (see [`cpu_index_from_mpidr`]); on every
//! other target (host tests included) it is always 0.

/// Upper bound on CPUs addressable through [`CpuLocal`].
pub const MAX_CPUS: usize = 16;

/// One instance of `T` per CPU.
pub struct CpuLocal<T> {
    slots: [T; MAX_CPUS],
}

impl<T> CpuLocal<T> {
    /// Wraps an already-initialized array of per-CPU values.
    pub const fn new(slots: [T; MAX_CPUS]) -> Self {
        Self { slots }
    }

    /// Returns the executing CPU's instance.
    ///
    /// An index past [`MAX_CPUS`] (a core this build was not configured
    /// for) falls back to slot 0 rather than panicking inside an exception
    /// handler.
    #[inline]
    pub fn get(&self) -> &T {
        self.slots
            .get(current_cpu_id() as usize)
            .unwrap_or(&self.slots[0])
    }

    /// Returns the instance belonging to `cpu`.
    ///
    /// # Panics
    ///
    /// Panics if `cpu >= MAX_CPUS`.
    pub fn get_for(&self, cpu: u32) -> &T {
        &self.slots[cpu as usize]
    }

    /// Iterates over every CPU's instance.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

const MPIDR_MT: u64 = 1 << 24;

/// Derives a [`CpuLocal`] slot index from an `MPIDR_EL1` value.
///
/// Cores that report `MT = 0` are numbered by `Aff0`. Cores with `MT = 1`
/// (DynamIQ clusters such as Cortex-A55/A76) keep `Aff0` at the thread
/// number, which is 0 on every core, and number cores by `Aff1`; those are
/// indexed by `Aff1`. Only one cluster is distinguished. An index of
/// [`MAX_CPUS`] or more lands in slot 0 through [`CpuLocal::get`].
pub const fn cpu_index_from_mpidr(mpidr: u64) -> u32 {
    if mpidr & MPIDR_MT != 0 {
        ((mpidr >> 8) & 0xff) as u32
    } else {
        (mpidr & 0xff) as u32
    }
}

/// Returns the index of the executing CPU.
#[inline]
pub fn current_cpu_id() -> u32 {
    #[cfg(all(target_os = "none", target_arch = "aarch64"))]
    {
        let mpidr: u64;
        // SAFETY: MPIDR_EL1 is readable at EL1 and above, which is where
        // kernel code runs on bare metal.
        unsafe {
            core::arch::asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nomem, nostack, preserves_flags));
        }
        cpu_index_from_mpidr(mpidr)
    }
    #[cfg(not(all(target_os = "none", target_arch = "aarch64")))]
    {
        0
    }
}
