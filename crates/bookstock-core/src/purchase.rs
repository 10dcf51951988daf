//! # Purchase Planning
//!
//! The decide step of a checkout, with no I/O.
//!
//! ## Where This Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Purchase Attempt                                 │
//! │                                                                         │
//! │  PurchaseRequest::new(items)      ← validate + merge duplicates (HERE) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN; SELECT books WHERE id IN (...)   (bookstock-db, snapshot read) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_purchase(&request, &snapshot)  ← NotFound / InsufficientStock    │
//! │       │                                 checks (HERE)                   │
//! │       ▼                                                                 │
//! │  UPDATE books SET stock = stock - n                                    │
//! │    WHERE id = ? AND version = ?     (bookstock-db, conditional write)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT → PurchasePlan::into_receipt                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Duplicate Book Ids
//! Quantities for a repeated book id are added together. The merged line
//! keeps the position of the first occurrence, the sufficiency check runs
//! against the sum, and a single decrement of the sum is applied.
//!
//! ## Totals
//! Line totals and the purchase total are computed while planning, with
//! checked arithmetic, so an amount that doesn't fit in `i64` cents is
//! rejected as `InvalidInput` before anything is written.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{PurchaseError, PurchaseResult, ValidationError};
use crate::money::Money;
use crate::types::Book;
use crate::validation::{validate_book_id, validate_quantity};

// =============================================================================
// Request
// =============================================================================

/// One cart line as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseItem {
    pub book_id: String,
    pub quantity: i64,
}

impl PurchaseItem {
    pub fn new(book_id: impl Into<String>, quantity: i64) -> Self {
        PurchaseItem {
            book_id: book_id.into(),
            quantity,
        }
    }
}

/// A validated purchase: at least one line, positive quantities, one line
/// per book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    lines: Vec<PurchaseItem>,
}

impl PurchaseRequest {
    /// Validates `items` and merges repeated book ids.
    ///
    /// ## Errors
    /// - `Empty` for an empty list
    /// - `MustBePositive` for a zero or negative quantity
    /// - `Overflow` when merged quantities for one book don't fit in `i64`
    ///
    /// ## Example
    /// ```rust
    /// use bookstock_core::purchase::{PurchaseItem, PurchaseRequest};
    ///
    /// let request = PurchaseRequest::new(vec![
    ///     PurchaseItem::new("a", 1),
    ///     PurchaseItem::new("b", 2),
    ///     PurchaseItem::new("a", 3),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(request.lines().len(), 2);
    /// assert_eq!(request.lines()[0].quantity, 4);
    /// ```
    pub fn new(items: Vec<PurchaseItem>) -> Result<Self, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::Empty {
                field: "items".to_string(),
            });
        }

        let mut lines: Vec<PurchaseItem> = Vec::with_capacity(items.len());
        let mut position: HashMap<String, usize> = HashMap::with_capacity(items.len());

        for item in items {
            validate_book_id(&item.book_id)?;
            validate_quantity(item.quantity)?;

            match position.get(&item.book_id) {
                Some(&idx) => {
                    let merged = lines[idx].quantity.checked_add(item.quantity).ok_or_else(|| {
                        ValidationError::Overflow {
                            field: format!("quantity for {}", item.book_id),
                        }
                    })?;
                    lines[idx].quantity = merged;
                }
                None => {
                    position.insert(item.book_id.clone(), lines.len());
                    lines.push(item);
                }
            }
        }

        Ok(PurchaseRequest { lines })
    }

    /// Merged lines in first-occurrence order.
    pub fn lines(&self) -> &[PurchaseItem] {
        &self.lines
    }

    /// Distinct book ids in request order.
    pub fn book_ids(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.book_id.clone()).collect()
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A decrement that passed the sufficiency check against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub book_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    /// Stock seen in the snapshot.
    pub available: i64,
    /// Version seen in the snapshot. The write must match it.
    pub expected_version: i64,
}

impl StockDecrement {
    pub fn remaining(&self) -> i64 {
        self.available - self.quantity
    }
}

/// Every decrement of a request, valid against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasePlan {
    pub decrements: Vec<StockDecrement>,
    pub total: Money,
}

impl PurchasePlan {
    /// Builds the receipt once the plan has been committed.
    pub fn into_receipt(self, attempts: u32) -> PurchaseReceipt {
        let lines: Vec<ReceiptLine> = self
            .decrements
            .into_iter()
            .map(|d| ReceiptLine {
                line_total: d.line_total,
                remaining_stock: d.remaining(),
                book_id: d.book_id,
                title: d.title,
                quantity: d.quantity,
                unit_price: d.unit_price,
            })
            .collect();

        PurchaseReceipt {
            lines,
            total: self.total,
            attempts,
        }
    }
}

/// Checks `request` against a snapshot of the referenced books.
///
/// Lines are checked in request order; the first failing line decides the
/// error. Missing books, short stock and totals too large to represent are
/// all reported before anything is written.
///
/// ## Example
/// ```rust,ignore
/// let snapshot: HashMap<String, Book> = rows.into_iter().map(|b| (b.id.clone(), b)).collect();
/// let plan = plan_purchase(&request, &snapshot)?;
/// ```
pub fn plan_purchase(
    request: &PurchaseRequest,
    snapshot: &HashMap<String, Book>,
) -> PurchaseResult<PurchasePlan> {
    let mut decrements = Vec::with_capacity(request.lines().len());
    let mut total = Money::zero();

    for line in request.lines() {
        let book = snapshot
            .get(&line.book_id)
            .ok_or_else(|| PurchaseError::NotFound(line.book_id.clone()))?;

        if !book.has_stock_for(line.quantity) {
            return Err(PurchaseError::insufficient(
                &line.book_id,
                book.stock,
                line.quantity,
            ));
        }

        let line_total = book
            .price
            .checked_multiply_quantity(line.quantity)
            .ok_or_else(|| ValidationError::Overflow {
                field: format!("line total for {}", line.book_id),
            })?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| ValidationError::Overflow {
                field: "purchase total".to_string(),
            })?;

        decrements.push(StockDecrement {
            book_id: line.book_id.clone(),
            title: book.title.clone(),
            quantity: line.quantity,
            unit_price: book.price,
            line_total,
            available: book.stock,
            expected_version: book.version,
        });
    }

    Ok(PurchasePlan { decrements, total })
}

// =============================================================================
// Receipt
// =============================================================================

/// One committed line of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptLine {
    pub book_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    /// Stock left right after this purchase committed.
    pub remaining_stock: i64,
}

/// Result of a committed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseReceipt {
    pub lines: Vec<ReceiptLine>,
    pub total: Money,
    /// How many snapshot/commit rounds it took (1 = no conflict).
    pub attempts: u32,
}

impl PurchaseReceipt {
    pub fn item_count(&self) -> i64 {
        self.lines
            .iter()
            .fold(0i64, |count, l| count.saturating_add(l.quantity))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(id: &str, stock: i64, price_cents: i64) -> Book {
        let now = Utc::now();
        Book {
            id: id.to_string(),
            title: format!("Title {}", id),
            author: "Author".to_string(),
            isbn: String::new(),
            price: Money::from_cents(price_cents),
            stock,
            category: String::new(),
            created_at: now,
            updated_at: now,
            version: 7,
        }
    }

    fn snapshot(books: Vec<Book>) -> HashMap<String, Book> {
        books.into_iter().map(|b| (b.id.clone(), b)).collect()
    }

    fn request(items: &[(&str, i64)]) -> PurchaseRequest {
        PurchaseRequest::new(
            items
                .iter()
                .map(|(id, qty)| PurchaseItem::new(*id, *qty))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_request_rejected() {
        assert!(matches!(
            PurchaseRequest::new(vec![]),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let zero = PurchaseRequest::new(vec![PurchaseItem::new("a", 0)]);
        assert!(matches!(zero, Err(ValidationError::MustBePositive { .. })));

        let negative = PurchaseRequest::new(vec![
            PurchaseItem::new("a", 1),
            PurchaseItem::new("b", -2),
        ]);
        assert!(negative.is_err());
    }

    #[test]
    fn test_blank_book_id_rejected() {
        let result = PurchaseRequest::new(vec![PurchaseItem::new("", 1)]);
        assert!(matches!(result, Err(ValidationError::Required { .. })));
    }

    #[test]
    fn test_duplicates_are_additive_in_first_position() {
        let req = request(&[("b", 1), ("a", 2), ("b", 3)]);
        assert_eq!(
            req.lines(),
            &[PurchaseItem::new("b", 4), PurchaseItem::new("a", 2)]
        );
        assert_eq!(req.book_ids(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_large_quantities_are_valid() {
        let req = request(&[("a", 1000), ("a", 4000)]);
        assert_eq!(req.lines(), &[PurchaseItem::new("a", 5000)]);
    }

    #[test]
    fn test_merged_quantity_overflow_rejected() {
        let result = PurchaseRequest::new(vec![
            PurchaseItem::new("a", i64::MAX),
            PurchaseItem::new("a", 1),
        ]);
        assert!(matches!(result, Err(ValidationError::Overflow { .. })));
    }

    #[test]
    fn test_plan_succeeds_with_enough_stock() {
        let plan = plan_purchase(&request(&[("a", 2)]), &snapshot(vec![book("a", 3, 1000)]))
            .unwrap();

        assert_eq!(plan.decrements.len(), 1);
        let d = &plan.decrements[0];
        assert_eq!(d.quantity, 2);
        assert_eq!(d.available, 3);
        assert_eq!(d.remaining(), 1);
        assert_eq!(d.expected_version, 7);
    }

    #[test]
    fn test_plan_exact_stock_is_sufficient() {
        let plan = plan_purchase(&request(&[("a", 3)]), &snapshot(vec![book("a", 3, 1000)]));
        assert!(plan.is_ok());
    }

    #[test]
    fn test_plan_missing_book() {
        let result = plan_purchase(&request(&[("missing", 1)]), &snapshot(vec![]));
        assert_eq!(result, Err(PurchaseError::NotFound("missing".to_string())));
    }

    #[test]
    fn test_plan_insufficient_stock_reports_available_and_requested() {
        let result = plan_purchase(
            &request(&[("a", 1), ("b", 999)]),
            &snapshot(vec![book("a", 3, 1000), book("b", 5, 500)]),
        );
        assert_eq!(result, Err(PurchaseError::insufficient("b", 5, 999)));
    }

    #[test]
    fn test_plan_duplicate_checked_against_sum() {
        // 2 + 2 > 3 even though each line alone fits
        let result = plan_purchase(
            &request(&[("a", 2), ("a", 2)]),
            &snapshot(vec![book("a", 3, 1000)]),
        );
        assert_eq!(result, Err(PurchaseError::insufficient("a", 3, 4)));
    }

    #[test]
    fn test_plan_first_failing_line_wins() {
        let result = plan_purchase(
            &request(&[("missing", 1), ("a", 50)]),
            &snapshot(vec![book("a", 3, 1000)]),
        );
        assert_eq!(result, Err(PurchaseError::NotFound("missing".to_string())));
    }

    #[test]
    fn test_plan_large_order_is_a_stock_question() {
        let books = snapshot(vec![book("a", 5000, 100), book("b", 5, 100)]);

        let plan = plan_purchase(&request(&[("a", 1000)]), &books).unwrap();
        assert_eq!(plan.total.cents(), 100_000);

        let result = plan_purchase(&request(&[("b", 1000)]), &books);
        assert_eq!(result, Err(PurchaseError::insufficient("b", 5, 1000)));
    }

    #[test]
    fn test_plan_line_total_overflow_rejected() {
        let result = plan_purchase(
            &request(&[("a", 3)]),
            &snapshot(vec![book("a", 10, i64::MAX / 2)]),
        );
        assert!(matches!(
            result,
            Err(PurchaseError::InvalidInput(ValidationError::Overflow { .. }))
        ));
    }

    #[test]
    fn test_plan_purchase_total_overflow_rejected() {
        // Each line fits on its own, the sum does not
        let result = plan_purchase(
            &request(&[("a", 1), ("b", 1)]),
            &snapshot(vec![book("a", 1, i64::MAX - 10), book("b", 1, 11)]),
        );
        assert!(matches!(
            result,
            Err(PurchaseError::InvalidInput(ValidationError::Overflow { .. }))
        ));
    }

    #[test]
    fn test_receipt_totals() {
        let plan = plan_purchase(
            &request(&[("a", 2), ("b", 1)]),
            &snapshot(vec![book("a", 3, 1000), book("b", 5, 1299)]),
        )
        .unwrap();

        let receipt = plan.into_receipt(1);
        assert_eq!(receipt.total.cents(), 3299);
        assert_eq!(receipt.item_count(), 3);
        assert_eq!(receipt.lines[0].line_total.cents(), 2000);
        assert_eq!(receipt.lines[0].remaining_stock, 1);
        assert_eq!(receipt.lines[1].remaining_stock, 4);
        assert_eq!(receipt.attempts, 1);
    }
}
