use thiserror::Error;

use crate::MAX_ANGULAR_ORDER;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SphericalError {
    #[error("invalid angular order {0} (expected 0 <= lambda <= {})", MAX_ANGULAR_ORDER)]
    InvalidOrder(i32),
    #[error("dimension mismatch: expected {expected} components, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, SphericalError>;

/// Reject orders outside `0..=MAX_ANGULAR_ORDER`.
pub(crate) fn check_order(lambda: i32) -> Result<()> {
    if (0..=MAX_ANGULAR_ORDER).contains(&lambda) {
        Ok(())
    } else {
        Err(SphericalError::InvalidOrder(lambda))
    }
}
