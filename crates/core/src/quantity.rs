//! Floating-point quantity helpers.
//!
//! Stock quantities are stored as `f64` (the storage contract uses floats), so
//! comparisons against limits go through a small tolerance.

use crate::error::{DomainError, DomainResult};

/// Tolerance used when comparing accumulated quantities against limits.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// `value > limit`, ignoring accumulated rounding noise.
pub fn exceeds(value: f64, limit: f64) -> bool {
    value - limit > QUANTITY_EPSILON
}

/// Reject NaN/infinite values and anything below zero.
pub fn ensure_non_negative(value: f64, field: &'static str) -> DomainResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::invalid_quantity(
            value,
            format!("{field} must be a finite, non-negative number"),
        ));
    }
    Ok(value)
}

/// Reject NaN/infinite values, zero and anything below zero.
pub fn ensure_positive(value: f64, field: &'static str) -> DomainResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DomainError::invalid_quantity(
            value,
            format!("{field} must be greater than zero"),
        ));
    }
    Ok(value)
}
