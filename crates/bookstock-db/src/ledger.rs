//! # Stock Ledger
//!
//! All-or-nothing multi-book purchases with optimistic conflict retry.
//!
//! ## One Purchase
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    purchase(items)                                      │
//! │                                                                         │
//! │  PurchaseRequest::new(items) ──► InvalidInput                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─── attempt n ───────────────────────────────────────────────────┐   │
//! │  │ BEGIN (deferred)                                                │   │
//! │  │ SELECT ... WHERE id IN (...)      ← snapshot read, no writes yet│   │
//! │  │ plan_purchase()                   ──► NotFound / Insufficient   │   │
//! │  │ UPDATE books SET stock = stock - q, version = version + 1       │   │
//! │  │   WHERE id = ? AND version = <seen> AND stock >= q              │   │
//! │  │ COMMIT                                                          │   │
//! │  └──────┬──────────────────────────────────────────┬───────────────┘   │
//! │         │ ok                                       │ conflict          │
//! │         ▼                                          ▼                   │
//! │  publish StockChanged,              ROLLBACK, back off, attempt n + 1  │
//! │  return PurchaseReceipt             (n = max_attempts → Transient-     │
//! │                                      Conflict)                         │
//! │                                                                         │
//! │  Whole call bounded by purchase.timeout ──► Unavailable                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What Counts as a Conflict
//! - A versioned UPDATE that matched zero rows (the book was written after
//!   the snapshot read)
//! - SQLite BUSY / BUSY_SNAPSHOT: in WAL mode a read transaction whose
//!   snapshot is no longer the latest cannot start writing
//!
//! Decrements are relative (`stock - q`), so two purchases never overwrite
//! each other's result. Nothing is compensated by hand: every failure path
//! rolls the transaction back before returning. A rollback that itself fails
//! is logged and the original outcome is still returned, since dropping the
//! transaction rolls it back regardless.

use std::collections::HashMap;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use bookstock_core::purchase::{plan_purchase, PurchasePlan};
use bookstock_core::{
    Book, PurchaseError, PurchaseItem, PurchaseReceipt, PurchaseRequest, PurchaseResult,
    ValidationError,
};

use crate::config::PurchaseSettings;
use crate::error::{DbError, DbResult};
use crate::feed::BookChange;
use crate::repository::book::{fetch_books_by_id, BOOK_COLUMNS};

/// How a single snapshot/commit round ended, when it didn't commit.
#[derive(Debug)]
enum AttemptError {
    /// The request can't be satisfied from this snapshot. Terminal.
    Rejected(PurchaseError),

    /// Storage failure; conflicts are retried, anything else is terminal.
    Store(DbError),
}

impl From<DbError> for AttemptError {
    fn from(err: DbError) -> Self {
        AttemptError::Store(err)
    }
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        AttemptError::Store(err.into())
    }
}

/// Owns the purchase transaction over the `books` table.
///
/// ## Usage
/// ```rust,ignore
/// let receipt = db
///     .ledger()
///     .purchase(vec![PurchaseItem::new(&a.id, 2), PurchaseItem::new(&b.id, 1)])
///     .await?;
/// println!("charged {}", receipt.total);
/// ```
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    changes: broadcast::Sender<BookChange>,
    settings: PurchaseSettings,
}

impl StockLedger {
    pub fn new(
        pool: SqlitePool,
        changes: broadcast::Sender<BookChange>,
        settings: PurchaseSettings,
    ) -> Self {
        StockLedger {
            pool,
            changes,
            settings,
        }
    }

    /// Atomically decrements stock for every item, or for none.
    ///
    /// ## Errors
    /// * `InvalidInput` - empty list, non-positive quantity, or an amount
    ///   too large to represent
    /// * `NotFound` - first missing book, in request order
    /// * `InsufficientStock` - first book with too few copies, in request order
    /// * `TransientConflict` - every attempt lost to a concurrent writer
    /// * `Unavailable` - store unreachable, or the call exceeded its timeout
    ///
    /// Repeated book ids are merged: their quantities are summed, checked
    /// once against stock, and decremented once.
    pub async fn purchase(&self, items: Vec<PurchaseItem>) -> PurchaseResult<PurchaseReceipt> {
        let request = PurchaseRequest::new(items)?;
        let timeout = self.settings.timeout();

        match tokio::time::timeout(timeout, self.purchase_with_retry(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, lines = request.lines().len(), "Purchase timed out");
                Err(PurchaseError::Unavailable(format!(
                    "purchase did not complete within {:?}",
                    timeout
                )))
            }
        }
    }

    /// Runs attempts until one commits, one is rejected, or the attempt
    /// budget is spent.
    async fn purchase_with_retry(
        &self,
        request: &PurchaseRequest,
    ) -> PurchaseResult<PurchaseReceipt> {
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.try_purchase(request).await {
                Ok(plan) => {
                    let receipt = plan.into_receipt(attempt);
                    self.publish(BookChange::StockChanged(request.book_ids()));

                    info!(
                        lines = receipt.lines.len(),
                        items = receipt.item_count(),
                        total = %receipt.total,
                        attempts = attempt,
                        "Purchase committed"
                    );
                    return Ok(receipt);
                }

                Err(AttemptError::Rejected(err)) => {
                    debug!(error = %err, attempt, "Purchase rejected");
                    return Err(err);
                }

                Err(AttemptError::Store(err)) if err.is_conflict() => {
                    if attempt >= self.settings.max_attempts {
                        warn!(attempts = attempt, error = %err, "Purchase retries exhausted");
                        return Err(PurchaseError::TransientConflict { attempts: attempt });
                    }

                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.settings.max_backoff());
                    debug!(attempt, ?delay, error = %err, "Purchase conflicted, retrying");
                    tokio::time::sleep(delay).await;
                }

                Err(AttemptError::Store(err)) => {
                    warn!(error = %err, attempt, "Purchase failed on store error");
                    return Err(err.into());
                }
            }
        }
    }

    /// One snapshot read, decision, and conditional write.
    async fn try_purchase(
        &self,
        request: &PurchaseRequest,
    ) -> Result<PurchasePlan, AttemptError> {
        let mut tx = self.pool.begin().await?;

        let snapshot: HashMap<String, Book> = fetch_books_by_id(&mut *tx, &request.book_ids())
            .await?
            .into_iter()
            .map(|book| (book.id.clone(), book))
            .collect();

        let plan = match plan_purchase(request, &snapshot) {
            Ok(plan) => plan,
            Err(err) => {
                discard(tx).await;
                return Err(AttemptError::Rejected(err));
            }
        };

        if let Err(err) = apply_decrements(&mut *tx, &plan).await {
            discard(tx).await;
            return Err(err.into());
        }

        tx.commit().await?;
        Ok(plan)
    }

    /// Adds `quantity` copies to a book's stock.
    ///
    /// A relative increment, so it composes with concurrent purchases
    /// instead of overwriting them.
    ///
    /// ## Returns
    /// * `Ok(Book)` - The record after restocking
    /// * `Err(DbError::Validation)` - Non-positive quantity or blank id
    /// * `Err(DbError::NotFound)` - Book doesn't exist
    pub async fn restock(&self, book_id: &str, quantity: i64) -> DbResult<Book> {
        bookstock_core::validation::validate_book_id(book_id)?;
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET stock = stock + ?2, version = version + 1, updated_at = ?3
            WHERE id = ?1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Book", book_id))?;

        info!(id = %book_id, quantity, stock = book.stock, "Book restocked");
        self.publish(BookChange::StockChanged(vec![book.id.clone()]));
        Ok(book)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.settings.initial_backoff(),
            max_interval: self.settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_attempts and the timeout
            ..Default::default()
        }
    }

    fn publish(&self, change: BookChange) {
        let _ = self.changes.send(change);
    }
}

/// Rolls back an attempt that won't commit.
async fn discard(tx: Transaction<'_, Sqlite>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "Rollback failed, connection will discard the transaction");
    }
}

/// Issues every versioned decrement of `plan` on `conn`.
///
/// Returns `Conflict` as soon as one row no longer matches the version seen
/// in the snapshot.
async fn apply_decrements(conn: &mut SqliteConnection, plan: &PurchasePlan) -> DbResult<()> {
    let now = Utc::now();

    for decrement in &plan.decrements {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET stock = stock - ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4 AND stock >= ?1
            "#,
        )
        .bind(decrement.quantity)
        .bind(now)
        .bind(&decrement.book_id)
        .bind(decrement.expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "book {} changed since version {}",
                decrement.book_id, decrement.expected_version
            )));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
