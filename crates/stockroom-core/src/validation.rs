//! # Validation
//!
//! Input validation for the engines: early, cheap checks that run before any
//! transaction is opened. Business rules that need database state (available
//! stock, remaining returnable quantity) live in the ledger and engines, not
//! here.

use thiserror::Error;

use crate::money::Money;

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A multi-line operation was submitted with no lines.
    #[error("{field} must contain at least one line")]
    EmptyLines { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

/// Checks that a quantity is strictly positive.
pub fn positive_quantity(field: &str, qty: i64) -> Result<(), ValidationError> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Checks that a money amount is strictly positive.
pub fn positive_amount(field: &str, amount: Money) -> Result<(), ValidationError> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Checks that a line collection is non-empty.
pub fn non_empty_lines<T>(field: &str, lines: &[T]) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyLines {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Checks that a string id is non-empty.
pub fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_quantity() {
        assert!(positive_quantity("quantity", 0).is_err());
        assert!(positive_quantity("quantity", -2).is_err());
        assert!(positive_quantity("quantity", 1).is_ok());
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(positive_amount("amount", Money::zero()).is_err());
        assert!(positive_amount("amount", Money::from_major(5)).is_ok());
    }

    #[test]
    fn rejects_empty_lines() {
        let none: [i64; 0] = [];
        assert!(non_empty_lines("lines", &none).is_err());
        assert!(non_empty_lines("lines", &[1]).is_ok());
    }

    #[test]
    fn rejects_blank_ids() {
        assert!(required("location_id", "  ").is_err());
        assert!(required("location_id", "loc-1").is_ok());
    }
}
