//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite, plus the change
//! channel that ties writers to live inventory feeds.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Application Startup                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreConfig::load() ──► DbConfig ← pool, purchase and feed settings   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► db.books()     BookRepository   ─┐                          │
//! │       ├──► db.ledger()    StockLedger      ─┼─► BookChange (broadcast) │
//! │       └──► db.subscribe() BookSubscription ◄┘                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Readers don't block writers, writers don't block readers
//! - A read transaction sees one stable snapshot until it ends
//! - A stale snapshot that tries to write fails with BUSY_SNAPSHOT,
//!   which the ledger treats as an optimistic conflict

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::{FeedSettings, PurchaseSettings};
use crate::error::{DbError, DbResult};
use crate::feed::{BookChange, BookSubscription, InventoryFeed};
use crate::ledger::StockLedger;
use crate::migrations;
use crate::repository::book::BookRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/bookstock.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Retry bounds handed to every `StockLedger`.
    pub purchase: PurchaseSettings,

    /// Refresh settings handed to every feed subscription.
    pub feed: FeedSettings,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            purchase: PurchaseSettings::default(),
            feed: FeedSettings::default(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the purchase retry settings.
    pub fn purchase(mut self, purchase: PurchaseSettings) -> Self {
        self.purchase = purchase;
        self
    }

    /// Sets the feed settings.
    pub fn feed(mut self, feed: FeedSettings) -> Self {
        self.feed = feed;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let config = DbConfig::in_memory();
    /// let db = Database::new(config).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // Every connection would get its own empty database
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            purchase: PurchaseSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository, ledger and feed access.
///
/// Cloning is cheap: clones share the pool and the change channel, so a
/// purchase made through one clone reaches feeds subscribed through another.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(StoreConfig::load(None)?.db_config()).await?;
///
/// let book = db.books().insert(&new_book).await?;
/// let mut feed = db.subscribe();
/// let receipt = db.ledger().purchase(vec![PurchaseItem::new(&book.id, 1)]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// In-process change notifications, one message per committed write.
    changes: broadcast::Sender<BookChange>,

    purchase: PurchaseSettings,

    feed: FeedSettings,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for snapshot reads alongside a writer
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            // May lose the last transaction on power loss, never corrupts
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let (changes, _) = broadcast::channel(config.feed.channel_capacity.max(1));

        let db = Database {
            pool,
            changes,
            purchase: config.purchase,
            feed: config.feed,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// ## When To Call
    /// - Automatically called by `new()` if `run_migrations` is true
    /// - Manually call when migrations are disabled in config
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// Writes made directly through the pool are not announced on the change
    /// channel; feeds only see them at the next poll.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the book repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let books = db.books().list().await?;
    /// ```
    pub fn books(&self) -> BookRepository {
        BookRepository::new(self.pool.clone(), self.changes.clone())
    }

    /// Returns the stock ledger, configured with the purchase settings.
    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.pool.clone(), self.changes.clone(), self.purchase.clone())
    }

    /// Returns the live inventory feed.
    pub fn feed(&self) -> InventoryFeed {
        InventoryFeed::new(self.pool.clone(), self.changes.clone(), self.feed.clone())
    }

    /// Starts a live subscription over all books, newest first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> BookSubscription {
        self.feed().subscribe()
    }

    /// Closes the database connection pool.
    ///
    /// ## Note
    /// After calling close, repository and ledger operations fail, and open
    /// subscriptions report a lost connection.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.purchase.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.books().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
    }
}
