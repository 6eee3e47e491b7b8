//! Internal helper macros.

/// Early-return with a flag when a predicate does not hold.
///
/// The scanner communicates through [`crate::flags::StatusFlag`] values
/// instead of `Result`, so this is the flag-returning sibling of the usual
/// `ensure!`.
macro_rules! ensure {
    ($predicate:expr, $flag:expr) => {
        if !$predicate {
            return $flag;
        }
    };
}

pub(crate) use ensure;
