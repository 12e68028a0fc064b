//! Compile-time and precondition assertion macros.
//!
//! [`static_assert!`] pins layout facts that assembly depends on.
//! [`assert_unsafe_precondition!`] guards the contract of an `unsafe fn`
//! whose violation would be undefined behavior rather than a plain bug.
//!
//! | Build | `assert_unsafe_precondition!` |
//! |-------|-------------------------------|
//! | `debug_assertions` | panics on failure |
//! | release + `cfg(tessel_hardened)` | panics on failure |
//! | release | compiled out, condition still type-checked |

/// Fails the build if `$cond` is false.
///
/// ```ignore
/// static_assert!(core::mem::size_of::<CalleeSaved>() == 13 * 8);
/// static_assert!(FRAME_SIZE % 16 == 0, "frames must keep sp aligned");
/// ```
#[macro_export]
macro_rules! static_assert {
    ($cond:expr $(,)?) => {
        const _: () = assert!($cond);
    };
    ($cond:expr, $msg:expr $(,)?) => {
        const _: () = assert!($cond, $msg);
    };
}

/// Checks a condition that the following `unsafe` code relies on for
/// soundness.
///
/// ```ignore
/// assert_unsafe_precondition!(stack_top % 16 == 0, "stack top {stack_top:#x} unaligned");
/// ```
#[macro_export]
macro_rules! assert_unsafe_precondition {
    ($cond:expr $(,)?) => {
        $crate::assert_unsafe_precondition!(
            $cond,
            "unsafe precondition violated: {}",
            stringify!($cond)
        )
    };
    ($cond:expr, $($arg:tt)+) => {
        #[cfg(any(debug_assertions, tessel_hardened))]
        {
            if !$cond {
                panic!($($arg)+);
            }
        }
        #[cfg(not(any(debug_assertions, tessel_hardened)))]
        {
            if false {
                let _ = $cond;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    static_assert!(core::mem::size_of::<u64>() == 8);
    static_assert!(core::mem::align_of::<u128>() >= 8, "u128 alignment");

    #[test]
    fn holding_precondition_is_silent() {
        let top = 0x4000_usize;
        assert_unsafe_precondition!(top % 16 == 0);
        assert_unsafe_precondition!(top != 0, "top is {top:#x}");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unsafe precondition violated: 3 % 2 == 0")]
    fn broken_precondition_names_the_condition() {
        assert_unsafe_precondition!(3 % 2 == 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "misaligned 0x1001")]
    fn broken_precondition_formats_message() {
        let addr = 0x1001_usize;
        assert_unsafe_precondition!(addr % 16 == 0, "misaligned {addr:#x}");
    }
}
