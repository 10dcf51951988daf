//! # Inventory Feed
//!
//! Live query over every book, newest first: an initial snapshot, then a new
//! full snapshot whenever the collection changes.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Feed                                       │
//! │                                                                         │
//! │  BookRepository ──┐                                                    │
//! │  StockLedger ─────┼──► broadcast<BookChange> ──┐                       │
//! │                   │                            │                        │
//! │                   │   poll_interval tick ──────┤  (writes from other    │
//! │                   │                            │   processes)           │
//! │                   │                            ▼                        │
//! │                   │                 ┌─────────────────────┐             │
//! │                   │                 │  feed task          │             │
//! │                   │                 │  SELECT ... ORDER BY│             │
//! │                   │                 │  created_at DESC, id│             │
//! │                   │                 │  skip if unchanged  │             │
//! │                   │                 └──────────┬──────────┘             │
//! │                   │                            │ mpsc<FeedEvent>        │
//! │                   │                            ▼                        │
//! │                   │                 BookSubscription::next()            │
//! │                                                                         │
//! │  Query fails  → ConnectionLost(reason)  (once per outage)              │
//! │  Query works  → Reconnected, then a fresh Snapshot                     │
//! │  cancel()/drop → task aborted, next() returns None                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every snapshot is the full collection, so a subscriber that misses
//! notifications (a lagged broadcast receiver) just refreshes and loses
//! nothing.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use sqlx::SqlitePool;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use bookstock_core::Book;

use crate::config::FeedSettings;
use crate::repository::book::list_books;

/// First retry delay after a failed refresh.
const RECONNECT_INITIAL: Duration = Duration::from_millis(100);

/// Retry delay ceiling while the store stays unreachable.
const RECONNECT_MAX: Duration = Duration::from_secs(10);

// =============================================================================
// Events
// =============================================================================

/// A committed write, announced by the component that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookChange {
    Inserted(String),
    Updated(String),
    Deleted(String),
    /// Stock moved on these books (purchase or restock).
    StockChanged(Vec<String>),
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The whole collection, newest first (ties broken by id).
    Snapshot(Vec<Book>),

    /// The store stopped answering. The subscription stays open and keeps
    /// retrying; sent once per outage.
    ConnectionLost(String),

    /// The store answers again. A fresh `Snapshot` follows.
    Reconnected,
}

// =============================================================================
// Feed
// =============================================================================

/// Factory for live subscriptions over the `books` table.
#[derive(Debug, Clone)]
pub struct InventoryFeed {
    pool: SqlitePool,
    changes: broadcast::Sender<BookChange>,
    settings: FeedSettings,
}

impl InventoryFeed {
    pub fn new(
        pool: SqlitePool,
        changes: broadcast::Sender<BookChange>,
        settings: FeedSettings,
    ) -> Self {
        InventoryFeed {
            pool,
            changes,
            settings,
        }
    }

    /// Starts a subscription. The first event is always the current
    /// snapshot (or `ConnectionLost` if the store can't be read).
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> BookSubscription {
        let (events_tx, events_rx) = mpsc::channel(self.settings.channel_capacity.max(1));

        // Subscribe before the first read so no write slips between them
        let task = FeedTask {
            pool: self.pool.clone(),
            changes: self.changes.subscribe(),
            changes_open: true,
            events: events_tx,
            poll_interval: self.settings.poll_interval(),
            last: None,
            lost: false,
            backoff: ExponentialBackoff {
                initial_interval: RECONNECT_INITIAL,
                max_interval: RECONNECT_MAX,
                multiplier: 2.0,
                max_elapsed_time: None, // retry for as long as the subscription lives
                ..Default::default()
            },
        };

        debug!(poll_interval = ?self.settings.poll_interval(), "Starting inventory subscription");

        BookSubscription {
            events: events_rx,
            task: tokio::spawn(task.run()),
            cancelled: false,
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Handle to a running live query.
///
/// Dropping the handle cancels the subscription.
///
/// ## Usage
/// ```rust,ignore
/// let mut feed = db.subscribe();
/// while let Some(event) = feed.next().await {
///     match event {
///         FeedEvent::Snapshot(books) => render(&books),
///         FeedEvent::ConnectionLost(reason) => show_offline_banner(&reason),
///         FeedEvent::Reconnected => hide_offline_banner(),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct BookSubscription {
    events: mpsc::Receiver<FeedEvent>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl BookSubscription {
    /// Waits for the next event. Returns `None` once cancelled.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        if self.cancelled {
            return None;
        }
        self.events.recv().await
    }

    /// Stops delivery. Events already buffered are discarded.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.task.abort();
        self.events.close();
        debug!("Inventory subscription cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Stream for BookSubscription {
    type Item = FeedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedEvent>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        this.events.poll_recv(cx)
    }
}

impl Drop for BookSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Feed Task
// =============================================================================

struct FeedTask {
    pool: SqlitePool,
    changes: broadcast::Receiver<BookChange>,
    /// False once every sender is gone; polling carries on alone.
    changes_open: bool,
    events: mpsc::Sender<FeedEvent>,
    poll_interval: Duration,
    /// Last snapshot delivered.
    last: Option<Vec<Book>>,
    /// Inside an outage (ConnectionLost sent, Reconnected not yet).
    lost: bool,
    backoff: ExponentialBackoff,
}

impl FeedTask {
    async fn run(mut self) {
        if !self.refresh().await {
            return;
        }

        loop {
            let wait = if self.lost {
                self.backoff.next_backoff().unwrap_or(RECONNECT_MAX)
            } else {
                self.poll_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}

                change = self.changes.recv(), if self.changes_open => {
                    match change {
                        Ok(change) => debug!(?change, "Refreshing feed after change"),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Feed lagged behind change notifications");
                        }
                        Err(RecvError::Closed) => {
                            debug!("Change channel closed, falling back to polling");
                            self.changes_open = false;
                        }
                    }
                }

                _ = self.events.closed() => {
                    debug!("Subscriber went away, stopping feed");
                    break;
                }
            }

            if !self.refresh().await {
                break;
            }
        }
    }

    /// Re-reads the collection and delivers whatever changed.
    ///
    /// Returns false when the subscriber is gone.
    async fn refresh(&mut self) -> bool {
        match list_books(&self.pool).await {
            Ok(books) => {
                if self.lost {
                    self.lost = false;
                    self.backoff.reset();
                    self.last = None;
                    info!("Inventory feed reconnected");
                    if !self.send(FeedEvent::Reconnected).await {
                        return false;
                    }
                }

                if self.last.as_ref() == Some(&books) {
                    return true;
                }

                debug!(count = books.len(), "Delivering inventory snapshot");
                self.last = Some(books.clone());
                self.send(FeedEvent::Snapshot(books)).await
            }

            Err(err) => {
                if self.lost {
                    debug!(error = %err, "Inventory feed still disconnected");
                    return true;
                }

                self.lost = true;
                warn!(error = %err, "Inventory feed lost connection to the store");
                self.send(FeedEvent::ConnectionLost(err.to_string())).await
            }
        }
    }

    async fn send(&self, event: FeedEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bookstock_core::{Money, NewBook, PurchaseItem};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(3);

    fn new_book(title: &str, stock: i64) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "N. K. Jemisin".to_string(),
            isbn: String::new(),
            price: Money::from_cents(1599),
            stock,
            category: "Fantasy".to_string(),
        }
    }

    async fn setup(poll_interval_ms: u64) -> Database {
        let config = DbConfig::in_memory().feed(FeedSettings {
            poll_interval_ms,
            channel_capacity: 16,
        });
        Database::new(config).await.unwrap()
    }

    async fn next_snapshot(sub: &mut BookSubscription) -> Vec<Book> {
        match timeout(WAIT, sub.next()).await.unwrap() {
            Some(FeedEvent::Snapshot(books)) => books,
            other => panic!("expected a snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_newest_first() {
        let db = setup(2000).await;
        let older = db.books().insert(&new_book("The Fifth Season", 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = db.books().insert(&new_book("The Obelisk Gate", 1)).await.unwrap();

        let mut sub = db.subscribe();
        let books = next_snapshot(&mut sub).await;

        let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    #[tokio::test]
    async fn test_empty_collection_still_snapshots() {
        let db = setup(2000).await;
        let mut sub = db.subscribe();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_follow_writes() {
        let db = setup(2000).await;
        let mut sub = db.subscribe();
        assert!(next_snapshot(&mut sub).await.is_empty());

        let book = db.books().insert(&new_book("The Stone Sky", 3)).await.unwrap();
        let books = next_snapshot(&mut sub).await;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].stock, 3);

        db.ledger()
            .purchase(vec![PurchaseItem::new(&book.id, 2)])
            .await
            .unwrap();
        let books = next_snapshot(&mut sub).await;
        assert_eq!(books[0].stock, 1);

        db.books().delete(&book.id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_collection_is_not_resent() {
        let db = setup(20).await;
        db.books().insert(&new_book("Broken Earth", 1)).await.unwrap();

        let mut sub = db.subscribe();
        next_snapshot(&mut sub).await;

        // Several polls happen here, none with anything new
        assert!(timeout(Duration::from_millis(200), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_poll_picks_up_unannounced_writes() {
        let db = setup(20).await;
        let mut sub = db.subscribe();
        assert!(next_snapshot(&mut sub).await.is_empty());

        // Straight through the pool, as another process would
        sqlx::query(
            "INSERT INTO books (id, title, author, isbn, price, stock, category, created_at, updated_at, version)
             VALUES ('ext-1', 'Outside', 'Someone', '', 500, 2, '', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let books = next_snapshot(&mut sub).await;
        assert_eq!(books[0].id, "ext-1");
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let db = setup(20).await;
        let mut sub = db.subscribe();
        next_snapshot(&mut sub).await;

        sub.cancel();
        assert!(sub.is_cancelled());
        assert!(sub.next().await.is_none());

        db.books().insert(&new_book("The City We Became", 1)).await.unwrap();
        assert!(sub.next().await.is_none());
        assert_eq!(db.books().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_lost_then_reconnected() {
        let db = setup(20).await;
        db.books().insert(&new_book("The Killing Moon", 2)).await.unwrap();

        let mut sub = db.subscribe();
        assert_eq!(next_snapshot(&mut sub).await.len(), 1);

        sqlx::query("ALTER TABLE books RENAME TO books_offline")
            .execute(db.pool())
            .await
            .unwrap();

        match timeout(WAIT, sub.next()).await.unwrap() {
            Some(FeedEvent::ConnectionLost(reason)) => assert!(!reason.is_empty()),
            other => panic!("expected ConnectionLost, got {other:?}"),
        }

        // Reported once, subscription still open
        assert!(timeout(Duration::from_millis(150), sub.next()).await.is_err());

        sqlx::query("ALTER TABLE books_offline RENAME TO books")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(
            timeout(WAIT, sub.next()).await.unwrap(),
            Some(FeedEvent::Reconnected)
        );
        assert_eq!(next_snapshot(&mut sub).await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_does_not_end_subscription() {
        let db = setup(20).await;
        let mut sub = db.subscribe();
        next_snapshot(&mut sub).await;

        db.close().await;

        assert!(matches!(
            timeout(WAIT, sub.next()).await.unwrap(),
            Some(FeedEvent::ConnectionLost(_))
        ));
        assert!(!sub.is_cancelled());
        assert!(timeout(Duration::from_millis(150), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_as_stream() {
        use tokio_stream::StreamExt;

        let db = setup(2000).await;
        db.books().insert(&new_book("Dreamblood", 1)).await.unwrap();

        let events: Vec<FeedEvent> = timeout(WAIT, db.subscribe().take(1).collect())
            .await
            .unwrap();
        assert!(matches!(&events[..], [FeedEvent::Snapshot(books)] if books.len() == 1));
    }
}
