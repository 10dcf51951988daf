//! # Validation Module
//!
//! Input validation for book records and purchase requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend form                                                │
//! │  ├── Required fields, numeric parsing                                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Field rules for NewBook / BookUpdate                              │
//! │  └── Purchase and restock quantities                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── CHECK (stock >= 0), CHECK (price >= 0)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookstock_core::validation::{validate_title, validate_quantity};
//!
//! validate_title("The Rust Programming Language").unwrap();
//! validate_quantity(2).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a book title (non-empty, at most 200 characters).
pub fn validate_title(title: &str) -> ValidationResult<()> {
    validate_required_text("title", title, 200)
}

/// Validates an author name (non-empty, at most 200 characters).
pub fn validate_author(author: &str) -> ValidationResult<()> {
    validate_required_text("author", author, 200)
}

/// Validates a category label. Empty means uncategorized.
pub fn validate_category(category: &str) -> ValidationResult<()> {
    if category.trim().chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "category".to_string(),
            max: 50,
        });
    }

    Ok(())
}

/// Validates an ISBN.
///
/// ## Rules
/// - May be empty (not every record has one)
/// - Otherwise 10 or 13 digits once hyphens and spaces are removed
/// - ISBN-10 may end in `X`
///
/// No checksum verification: imported catalogs carry plenty of ISBNs with
/// bad check digits and the store still needs to sell them.
///
/// ## Example
/// ```rust
/// use bookstock_core::validation::validate_isbn;
///
/// assert!(validate_isbn("978-1-59327-828-1").is_ok());
/// assert!(validate_isbn("0-306-40615-X").is_ok());
/// assert!(validate_isbn("").is_ok());
/// assert!(validate_isbn("12345").is_err());
/// ```
pub fn validate_isbn(isbn: &str) -> ValidationResult<()> {
    let compact: Vec<char> = isbn
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect();

    if compact.is_empty() {
        return Ok(());
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "isbn".to_string(),
        reason: reason.to_string(),
    };

    match compact.len() {
        13 if compact.iter().all(|c| c.is_ascii_digit()) => Ok(()),
        10 if compact[..9].iter().all(|c| c.is_ascii_digit())
            && (compact[9].is_ascii_digit() || compact[9] == 'X' || compact[9] == 'x') =>
        {
            Ok(())
        }
        10 | 13 => Err(invalid("must contain only digits (ISBN-10 may end in X)")),
        _ => Err(invalid("must have 10 or 13 digits")),
    }
}

/// Validates a book identifier.
///
/// Identifiers are opaque strings; only emptiness and length are checked.
pub fn validate_book_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "book id".to_string(),
        });
    }

    if id.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "book id".to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price. Zero is allowed (giveaways), negative is not.
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock level entered by inventory management.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a purchase or restock quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - No upper bound: a large order is a stock question, answered by the
///   ledger as `InsufficientStock`
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Checkout                                                         │
/// │                                                                         │
/// │  Line quantity: 5                                                      │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → InvalidInput: "quantity must be positive"        │
/// │       │                                                                 │
/// │       └── OK → StockLedger::purchase                                   │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
