//! # bookstock-db: Inventory Store for Bookstock
//!
//! SQLite-backed book inventory: record CRUD, the all-or-nothing purchase
//! transaction, and a live feed of the whole collection.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookstock Data Flow                              │
//! │                                                                         │
//! │  Checkout / inventory form / online store view                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bookstock-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │   │
//! │  │   │  Database   │  │  StockLedger │  │   InventoryFeed     │  │   │
//! │  │   │  (pool.rs)  │  │  (ledger.rs) │  │   (feed.rs)         │  │   │
//! │  │   │             │  │              │  │                     │  │   │
//! │  │   │ SqlitePool  │◄─│ purchase()   │─►│ BookSubscription    │  │   │
//! │  │   │ migrations  │  │ restock()    │  │ Snapshot / Lost /   │  │   │
//! │  │   │ config      │  │ retry+backoff│  │ Reconnected         │  │   │
//! │  │   └─────────────┘  └──────────────┘  └─────────────────────┘  │   │
//! │  │          ▲                                     ▲               │   │
//! │  │          └──────── BookRepository (CRUD) ──────┘               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - TOML + environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Book CRUD
//! - [`ledger`] - Purchase transaction with conflict retry
//! - [`feed`] - Live inventory subscription
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstock_core::PurchaseItem;
//! use bookstock_db::{Database, FeedEvent, StoreConfig};
//!
//! let config = StoreConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let mut feed = db.subscribe();
//! let receipt = db.ledger().purchase(vec![PurchaseItem::new(book_id, 2)]).await?;
//!
//! while let Some(FeedEvent::Snapshot(books)) = feed.next().await {
//!     // re-render
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, FeedSettings, PurchaseSettings, StoreConfig};
pub use error::{DbError, DbResult};
pub use feed::{BookChange, BookSubscription, FeedEvent, InventoryFeed};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::book::BookRepository;
