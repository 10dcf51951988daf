//! # Book Repository
//!
//! Database operations for book records.
//!
//! ## Key Operations
//! - CRUD operations (hard delete)
//! - Listing in feed order: newest first, id as tie-breaker
//! - Multi-id reads usable inside a ledger transaction
//!
//! ## Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Every Write Bumps `version`                          │
//! │                                                                         │
//! │  insert            → version = 0                                       │
//! │  update (edit)     → version = version + 1                             │
//! │  purchase (ledger) → version = version + 1  WHERE version = <seen>     │
//! │                                                                         │
//! │  An edit landing between a purchase's read and its write makes the    │
//! │  purchase's versioned UPDATE match zero rows, so the purchase retries  │
//! │  against the edited record instead of overwriting it.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use bookstock_core::{Book, BookUpdate, NewBook};

use crate::error::{DbError, DbResult};
use crate::feed::BookChange;

/// Column list shared by every query that materializes a [`Book`].
pub(crate) const BOOK_COLUMNS: &str =
    "id, title, author, isbn, price, stock, category, created_at, updated_at, version";

/// Repository for book database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.books();
///
/// let book = repo.insert(&new_book).await?;
/// let same = repo.get_by_id(&book.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
    changes: broadcast::Sender<BookChange>,
}

impl BookRepository {
    /// Creates a new BookRepository.
    pub fn new(pool: SqlitePool, changes: broadcast::Sender<BookChange>) -> Self {
        BookRepository { pool, changes }
    }

    /// Inserts a new book.
    ///
    /// Text fields are trimmed, then every field is validated. The id is a
    /// fresh UUID v4; `created_at` and `updated_at` are set to now.
    ///
    /// ## Returns
    /// * `Ok(Book)` - The stored record, version 0
    /// * `Err(DbError::Validation)` - A field failed validation
    pub async fn insert(&self, new_book: &NewBook) -> DbResult<Book> {
        let new_book = new_book.normalized();
        new_book.validate()?;

        let now = Utc::now();
        let book = Book {
            id: generate_book_id(),
            title: new_book.title,
            author: new_book.author,
            isbn: new_book.isbn,
            price: new_book.price,
            stock: new_book.stock,
            category: new_book.category,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        debug!(id = %book.id, title = %book.title, "Inserting book");

        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, author, isbn, price, stock, category,
                created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.price)
        .bind(book.stock)
        .bind(&book.category)
        .bind(book.created_at)
        .bind(book.updated_at)
        .bind(book.version)
        .execute(&self.pool)
        .await?;

        self.publish(BookChange::Inserted(book.id.clone()));
        Ok(book)
    }

    /// Gets a book by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Book))` - Book found
    /// * `Ok(None)` - Book not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = ?1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Gets every book whose id is in `ids`. Missing ids are simply absent
    /// from the result; order is unspecified.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Book>> {
        let mut conn = self.pool.acquire().await?;
        fetch_books_by_id(&mut conn, ids).await
    }

    /// Lists all books, newest first (ties broken by id).
    pub async fn list(&self) -> DbResult<Vec<Book>> {
        let books = list_books(&self.pool).await?;

        debug!(count = books.len(), "Listed books");
        Ok(books)
    }

    /// Counts total books (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Applies a partial edit.
    ///
    /// Fields left as `None` keep their stored value; `created_at` is never
    /// touched. The version is bumped even when the new values equal the old
    /// ones, so in-flight purchases re-read the record.
    ///
    /// ## Returns
    /// * `Ok(Book)` - The record after the edit
    /// * `Err(DbError::Validation)` - Empty update or a bad field
    /// * `Err(DbError::NotFound)` - Book doesn't exist
    pub async fn update(&self, id: &str, changes: &BookUpdate) -> DbResult<Book> {
        let changes = changes.normalized();
        changes.validate()?;

        debug!(id = %id, "Updating book");

        let now = Utc::now();

        let updated = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books SET
                title = COALESCE(?2, title),
                author = COALESCE(?3, author),
                isbn = COALESCE(?4, isbn),
                price = COALESCE(?5, price),
                stock = COALESCE(?6, stock),
                category = COALESCE(?7, category),
                updated_at = ?8,
                version = version + 1
            WHERE id = ?1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.isbn)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(&changes.category)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Book", id))?;

        self.publish(BookChange::Updated(updated.id.clone()));
        Ok(updated)
    }

    /// Permanently deletes a book.
    ///
    /// ## Returns
    /// * `Ok(())` - Book removed
    /// * `Err(DbError::NotFound)` - Book doesn't exist
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting book");

        let result = sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        self.publish(BookChange::Deleted(id.to_string()));
        Ok(())
    }

    /// Announces a committed write. Having no subscribers is fine.
    fn publish(&self, change: BookChange) {
        let _ = self.changes.send(change);
    }
}

/// Reads the whole collection, newest first, ties broken by id.
pub(crate) async fn list_books(pool: &SqlitePool) -> DbResult<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books ORDER BY created_at DESC, id ASC",
        BOOK_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// Reads the books with the given ids on `conn`.
///
/// Runs on whatever connection it is given, so inside a transaction it sees
/// that transaction's snapshot.
pub(crate) async fn fetch_books_by_id(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> DbResult<Vec<Book>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM books WHERE id IN (", BOOK_COLUMNS));
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let books = query.build_query_as::<Book>().fetch_all(&mut *conn).await?;
    Ok(books)
}

/// Helper to generate a new book ID.
pub fn generate_book_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bookstock_core::{Money, ValidationError};
    use std::time::Duration;

    fn new_book(title: &str, stock: i64) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Ursula K. Le Guin".to_string(),
            isbn: "978-0-441-47812-5".to_string(),
            price: Money::from_cents(1099),
            stock,
            category: "Fiction".to_string(),
        }
    }

    async fn setup() -> (BookRepository, broadcast::Receiver<BookChange>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (tx, rx) = broadcast::channel(16);
        (BookRepository::new(db.pool().clone(), tx), rx)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (repo, mut changes) = setup().await;

        let book = repo.insert(&new_book("  The Dispossessed ", 4)).await.unwrap();
        assert_eq!(book.title, "The Dispossessed");
        assert_eq!(book.version, 0);
        assert_eq!(changes.try_recv().unwrap(), BookChange::Inserted(book.id.clone()));

        let fetched = repo.get_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, book.id);
        assert_eq!(fetched.price, Money::from_cents(1099));
        assert_eq!(fetched.stock, 4);
        assert_eq!(fetched.created_at, book.created_at);

        assert!(repo.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_book() {
        let (repo, mut changes) = setup().await;

        let err = repo.insert(&new_book("   ", 1)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::Required { .. })
        ));

        let err = repo.insert(&new_book("Negative", -1)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (repo, _changes) = setup().await;

        let first = repo.insert(&new_book("First", 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = repo.insert(&new_book("Second", 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let third = repo.insert(&new_book("Third", 1)).await.unwrap();

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let (repo, _changes) = setup().await;

        let a = repo.insert(&new_book("A", 1)).await.unwrap();
        let b = repo.insert(&new_book("B", 2)).await.unwrap();

        let mut found = repo
            .get_many(&[a.id.clone(), "missing".to_string(), b.id.clone()])
            .await
            .unwrap();
        found.sort_by(|x, y| x.title.cmp(&y.title));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, a.id);
        assert_eq!(found[1].id, b.id);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_created_at() {
        let (repo, mut changes) = setup().await;
        let book = repo.insert(&new_book("Lathe of Heaven", 2)).await.unwrap();
        let _ = changes.try_recv();

        let updated = repo
            .update(
                &book.id,
                &BookUpdate {
                    price: Some(Money::from_cents(1299)),
                    stock: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, book.title);
        assert_eq!(updated.price, Money::from_cents(1299));
        assert_eq!(updated.stock, 10);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.created_at, book.created_at);
        assert!(updated.updated_at >= book.updated_at);
        assert_eq!(changes.try_recv().unwrap(), BookChange::Updated(book.id.clone()));
    }

    #[tokio::test]
    async fn test_update_errors() {
        let (repo, _changes) = setup().await;
        let book = repo.insert(&new_book("Always Coming Home", 2)).await.unwrap();

        let err = repo.update(&book.id, &BookUpdate::default()).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::Empty { .. })));

        let err = repo
            .update(
                &book.id,
                &BookUpdate {
                    stock: Some(-3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let err = repo
            .update(
                "missing",
                &BookUpdate {
                    title: Some("X".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let unchanged = repo.get_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(unchanged.version, 0);
        assert_eq!(unchanged.stock, 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, mut changes) = setup().await;
        let book = repo.insert(&new_book("Tehanu", 1)).await.unwrap();
        let _ = changes.try_recv();

        repo.delete(&book.id).await.unwrap();
        assert!(repo.get_by_id(&book.id).await.unwrap().is_none());
        assert_eq!(changes.try_recv().unwrap(), BookChange::Deleted(book.id.clone()));

        let err = repo.delete(&book.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
