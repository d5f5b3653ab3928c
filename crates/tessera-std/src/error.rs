use tessera_runtime::AllocError;
use thiserror::Error;

/// Errors raised at the entry of an algorithm, before any kernel is
/// submitted, so a failed call never leaves partial device-side mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two ranges that must cover the same number of elements do not.
    #[error("input ranges differ in length: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first range.
        left: usize,
        /// Length of the second range.
        right: usize,
    },

    /// An output range is too small for the worst-case result.
    #[error("output holds {provided} elements, needs at least {required}")]
    OutputTooSmall {
        /// Length of the provided output range.
        provided: usize,
        /// Minimum length required.
        required: usize,
    },

    /// Device-side scratch allocation failed.
    #[error("scratch allocation failed\nCaused by:\n  {0}")]
    Alloc(#[from] AllocError),
}

pub(crate) fn ensure_same_length(left: usize, right: usize) -> Result<(), Error> {
    if left == right {
        Ok(())
    } else {
        Err(Error::LengthMismatch { left, right })
    }
}

pub(crate) fn ensure_output_fits(provided: usize, required: usize) -> Result<(), Error> {
    if provided >= required {
        Ok(())
    } else {
        Err(Error::OutputTooSmall { provided, required })
    }
}
