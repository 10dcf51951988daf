//! # Domain Types
//!
//! Book records and the inputs that create or edit them.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Book       │   │     NewBook     │   │   BookUpdate    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  title          │   │  title?         │       │
//! │  │  title, author  │   │  author         │   │  author?        │       │
//! │  │  isbn, category │   │  isbn, category │   │  price?         │       │
//! │  │  price (Money)  │   │  price, stock   │   │  stock?  ...    │       │
//! │  │  stock (>= 0)   │   └─────────────────┘   └─────────────────┘       │
//! │  │  created_at     │                                                    │
//! │  │  version        │ ← bumped by every write, checked by purchases      │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{
    validate_author, validate_category, validate_isbn, validate_price, validate_stock,
    validate_title, ValidationResult,
};

// =============================================================================
// Book
// =============================================================================

/// A book in the store's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Book {
    /// Unique identifier (UUID v4 for records created here).
    pub id: String,

    pub title: String,

    pub author: String,

    /// ISBN-10 or ISBN-13, possibly empty.
    pub isbn: String,

    /// Unit price in cents.
    pub price: Money,

    /// Copies on hand. Never negative.
    pub stock: i64,

    /// Free-form category label ("Fiction", "Science", ...).
    pub category: String,

    /// Set once on insert.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token.
    pub version: i64,
}

impl Book {
    /// Checks whether `quantity` copies can be sold from this snapshot.
    #[inline]
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }

    /// Value of the copies on hand, `None` if it doesn't fit in cents.
    pub fn stock_value(&self) -> Option<Money> {
        self.price.checked_multiply_quantity(self.stock)
    }
}

// =============================================================================
// New Book
// =============================================================================

/// Input for creating a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: String,
    pub price: Money,
    pub stock: i64,
    #[serde(default)]
    pub category: String,
}

impl NewBook {
    /// Validates every field.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_title(&self.title)?;
        validate_author(&self.author)?;
        validate_isbn(&self.isbn)?;
        validate_price(self.price)?;
        validate_stock(self.stock)?;
        validate_category(&self.category)?;
        Ok(())
    }

    /// Returns a copy with surrounding whitespace stripped from text fields.
    pub fn normalized(&self) -> NewBook {
        NewBook {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: self.isbn.trim().to_string(),
            price: self.price,
            stock: self.stock,
            category: self.category.trim().to_string(),
        }
    }
}

// =============================================================================
// Book Update
// =============================================================================

/// Partial edit of a book. `None` leaves the field as it is.
///
/// `id` and `created_at` are not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BookUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl BookUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category.is_none()
    }

    /// Validates the fields that are present. An empty update is rejected.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.is_empty() {
            return Err(ValidationError::Empty {
                field: "update".to_string(),
            });
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(author) = &self.author {
            validate_author(author)?;
        }
        if let Some(isbn) = &self.isbn {
            validate_isbn(isbn)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        Ok(())
    }

    /// Returns a copy with surrounding whitespace stripped from text fields.
    pub fn normalized(&self) -> BookUpdate {
        let trim = |s: &Option<String>| s.as_ref().map(|v| v.trim().to_string());
        BookUpdate {
            title: trim(&self.title),
            author: trim(&self.author),
            isbn: trim(&self.isbn),
            price: self.price,
            stock: self.stock,
            category: trim(&self.category),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_book() -> NewBook {
        NewBook {
            title: "  Dune ".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "978-0-441-17271-9".to_string(),
            price: Money::from_cents(999),
            stock: 3,
            category: "Science Fiction".to_string(),
        }
    }

    #[test]
    fn test_new_book_validation() {
        assert!(sample_new_book().validate().is_ok());

        let mut bad = sample_new_book();
        bad.stock = -1;
        assert!(bad.validate().is_err());

        let mut bad = sample_new_book();
        bad.author = String::new();
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_new_book_normalized_trims() {
        assert_eq!(sample_new_book().normalized().title, "Dune");
    }

    #[test]
    fn test_empty_update_rejected() {
        let update = BookUpdate::default();
        assert!(update.is_empty());
        assert!(matches!(
            update.validate(),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_partial_update_validates_present_fields_only() {
        let update = BookUpdate {
            price: Some(Money::from_cents(1500)),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = BookUpdate {
            stock: Some(-4),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_book_serializes_with_frontend_field_names() {
        let now = Utc::now();
        let book = Book {
            id: "b1".to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: String::new(),
            price: Money::from_cents(1000),
            stock: 3,
            category: "Fiction".to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["price"], 1000);
        assert_eq!(json["stock"], 3);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
        assert_eq!(book.stock_value(), Some(Money::from_cents(3000)));
        assert!(book.has_stock_for(3));
        assert!(!book.has_stock_for(4));
    }
}
