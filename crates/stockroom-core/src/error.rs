//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  stockroom-engine errors                                               │
//! │  └── EngineError      - Domain | Db, what callers see                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → calling layer       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//! Every business-rule violation aborts the enclosing transaction (full
//! rollback) and surfaces as a typed error. The only transparently recovered
//! condition is the first-stock-row creation race (`ConcurrencyConflict`),
//! which the ledger retries exactly once and never surfaces.

use thiserror::Error;

use crate::validation::ValidationError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Available stock (quantity − reserved) is below the requested amount.
    ///
    /// Raised by the stock ledger's `reserve` and `deduct`; rejects the
    /// ENTIRE multi-line operation it occurred in — no partial application.
    #[error(
        "insufficient stock for variant {variant_id} at {location_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        variant_id: String,
        location_id: String,
        available: i64,
        requested: i64,
    },

    /// Unknown invoice/order/return/variant/location id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Completing an already-paid or cancelled invoice
    /// - Cancelling an already-cancelled invoice (compensation runs once)
    /// - Returning more than the remaining quantity on a line
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        current: String,
        action: &'static str,
    },

    /// Unique-constraint race creating the first stock row for a
    /// (location, variant) pair. Recovered locally with one retry; callers
    /// only ever see this if the retry itself loses, which means the row now
    /// exists and the retried update should have applied.
    #[error("concurrent stock row creation for variant {variant_id} at {location_id}")]
    ConcurrencyConflict {
        variant_id: String,
        location_id: String,
    },

    /// Input validation failure (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an InvalidStateTransition error.
    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        current: impl Into<String>,
        action: &'static str,
    ) -> Self {
        CoreError::InvalidStateTransition {
            entity,
            id: id.into(),
            current: current.into(),
            action,
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_carries_counts() {
        let err = CoreError::InsufficientStock {
            variant_id: "var-1".into(),
            location_id: "loc-1".into(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for variant var-1 at loc-1: available 3, requested 5"
        );
    }

    #[test]
    fn transition_message_names_state_and_action() {
        let err = CoreError::invalid_transition("Invoice", "inv-1", "cancelled", "cancel");
        assert_eq!(err.to_string(), "Invoice inv-1 is cancelled, cannot cancel");
    }

    #[test]
    fn validation_converts_to_core_error() {
        let err: CoreError = ValidationError::MustBePositive {
            field: "quantity".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
