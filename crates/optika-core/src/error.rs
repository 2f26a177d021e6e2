//! # Error Types
//!
//! Domain-specific error types for optika-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  optika-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule / precondition violations        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  optika-db errors (separate crate)                                     │
//! │  └── DbError          - Database and archive-file failures             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each failure is a typed variant so callers can branch on it; the
//! `Display` form is the human-readable message.
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (OS number, store, etc.)
//! 3. Errors are enum variants, never String
//! 4. Precondition violations mean NO state was mutated

use thiserror::Error;

use crate::status::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The order is not in the state the requested transition demands.
    ///
    /// ## When This Occurs
    /// - Releasing to procurement an order that is not `venda_concluida`
    /// - Confirming assembly on an order never sent to assembly
    /// - A concurrent request already moved the order (compare-and-swap miss)
    #[error("order {os_number} is '{found}', cannot {action}")]
    InvalidTransition {
        os_number: String,
        found: OrderStatus,
        action: &'static str,
    },

    /// Service order does not exist.
    #[error("service order not found: {0}")]
    OrderNotFound(String),

    /// Sale (CV) does not exist.
    #[error("sale not found: CV {0}")]
    SaleNotFound(i64),

    /// A till session is already open for the store.
    #[error("store {store} already has an open till session")]
    TillAlreadyOpen { store: String },

    /// The day was finalized; no more till sessions may open today.
    #[error("store {store}: the day is finalized, no further till sessions allowed today")]
    DayAlreadyFinalized { store: String },

    /// The operation requires an open till session and none exists today.
    #[error("store {store} has no open till session today")]
    NoOpenSession { store: String },

    /// Reopen requires a settled session and none exists today.
    #[error("store {store} has no settled till session today")]
    NoSettledSession { store: String },

    /// Day finalization found no open or settled sessions to finalize.
    ///
    /// Also the answer to a second finalize on the same day: nothing is
    /// re-summed, the batch is simply empty and rejected.
    #[error("store {store} has no till session pending finalization today")]
    NothingToFinalize { store: String },

    /// A partial return was requested with no line items selected.
    #[error("no items selected for return")]
    NoItemsSelected,

    /// A grade axis range cannot be iterated.
    ///
    /// ## When This Occurs
    /// - Non-positive step
    /// - Bounds in the wrong order for the axis
    /// Nothing is generated or persisted when this is returned.
    #[error("invalid {axis} range: {reason}")]
    InvalidGradeRange { axis: &'static str, reason: String },

    /// The role does not carry the required capability.
    #[error("role '{role}' may not {action}")]
    Forbidden { role: String, action: &'static str },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when operator input doesn't meet requirements, before any
/// business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Store codes are two digits, 01 through 99.
    #[error("invalid store code '{value}': must be 01 through 99")]
    InvalidStoreCode { value: String },

    /// Product barcodes are exactly seven digits with a category prefix.
    #[error("invalid barcode '{value}': must be 7 digits starting 0, 1 or 2")]
    InvalidBarcode { value: String },

    /// Money input was not a fixed two-decimal number.
    #[error("invalid amount '{value}': expected a two-decimal number")]
    InvalidAmount { value: String },

    /// Diopter input was not a fixed two-decimal number.
    #[error("invalid diopter '{value}': expected a two-decimal number")]
    InvalidDiopter { value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            os_number: "0100001".to_string(),
            found: OrderStatus::Cancelada,
            action: "release to procurement",
        };
        assert_eq!(
            err.to_string(),
            "order 0100001 is 'cancelada', cannot release to procurement"
        );

        let err = CoreError::TillAlreadyOpen {
            store: "01".to_string(),
        };
        assert_eq!(err.to_string(), "store 01 already has an open till session");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::InvalidStoreCode {
            value: "00".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid store code '00': must be 01 through 99"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "observation",
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
