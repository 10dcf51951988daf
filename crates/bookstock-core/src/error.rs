//! # Error Types
//!
//! Domain-specific error types for bookstock-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookstock-core errors (this file)                                     │
//! │  ├── PurchaseError    - Everything a checkout can fail with            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bookstock-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → PurchaseError::InvalidInput → caller/UI       │
//! │        DbError (connectivity) → PurchaseError::Unavailable → caller/UI │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (book id, quantities)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Purchase Error
// =============================================================================

/// Why a purchase was rejected.
///
/// Every variant is terminal for the call that produced it. When any of these
/// is returned, no stock was modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    /// A referenced book does not exist.
    #[error("Book not found: {0}")]
    NotFound(String),

    /// A book has fewer copies than requested.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout cart [(A, 2)]
    ///      │
    ///      ▼
    /// Snapshot read: A.stock = 1
    ///      │
    ///      ▼
    /// InsufficientStock { book_id: A, available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// UI shows: "Only 1 copy left"
    /// ```
    #[error("Insufficient stock for book {book_id}: available {available}, requested {requested}")]
    InsufficientStock {
        book_id: String,
        available: i64,
        requested: i64,
    },

    /// Concurrent purchases kept invalidating the snapshot until the retry
    /// budget ran out.
    #[error("Purchase conflicted with concurrent updates after {attempts} attempts")]
    TransientConflict { attempts: u32 },

    /// The backing store could not be reached (or the purchase timed out).
    #[error("Inventory store unavailable: {0}")]
    Unavailable(String),

    /// The request itself is malformed (empty cart, non-positive quantity).
    #[error("Invalid purchase request: {0}")]
    InvalidInput(#[from] ValidationError),
}

impl PurchaseError {
    /// Creates an InsufficientStock error.
    pub fn insufficient(book_id: impl Into<String>, available: i64, requested: i64) -> Self {
        PurchaseError::InsufficientStock {
            book_id: book_id.into(),
            available,
            requested,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed price).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A collection that must have entries has none.
    #[error("{field} must not be empty")]
    Empty { field: String },

    /// A computed amount or count doesn't fit in an `i64`.
    #[error("{field} is too large")]
    Overflow { field: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for purchase outcomes.
pub type PurchaseResult<T> = Result<T, PurchaseError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = PurchaseError::insufficient("book-a", 1, 2);
        assert_eq!(
            err.to_string(),
            "Insufficient stock for book book-a: available 1, requested 2"
        );
    }

    #[test]
    fn test_validation_converts_to_purchase_error() {
        let err: PurchaseError = ValidationError::Empty {
            field: "items".to_string(),
        }
        .into();
        assert!(matches!(err, PurchaseError::InvalidInput(_)));
        assert_eq!(
            err.to_string(),
            "Invalid purchase request: items must not be empty"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "title".to_string(),
        };
        assert_eq!(err.to_string(), "title is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }
}
