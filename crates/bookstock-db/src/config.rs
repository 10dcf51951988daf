//! # Store Configuration
//!
//! Configuration for the inventory store: database location, purchase retry
//! bounds, and feed refresh settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BOOKSTOCK_DB_PATH=/var/lib/bookstock/books.db                      │
//! │     BOOKSTOCK_MAX_ATTEMPTS=8                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bookstock/bookstock.toml (Linux)                         │
//! │     ~/Library/Application Support/com.bookstock.bookstock/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "bookstock.db"
//! max_connections = 5
//!
//! [purchase]
//! max_attempts = 5
//! initial_backoff_ms = 10
//! max_backoff_ms = 200
//! timeout_secs = 10
//!
//! [feed]
//! poll_interval_ms = 2000
//! channel_capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite file lives and how the pool is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Pool acquire timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bookstock.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Purchase Settings
// =============================================================================

/// Bounds on the purchase conflict-retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseSettings {
    /// Snapshot/commit rounds before giving up with TransientConflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Retry delay ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Overall deadline for one purchase call (seconds).
    #[serde(default = "default_purchase_timeout")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    10
}
fn default_max_backoff() -> u64 {
    200
}
fn default_purchase_timeout() -> u64 {
    10
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        PurchaseSettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            timeout_secs: default_purchase_timeout(),
        }
    }
}

impl PurchaseSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Feed Settings
// =============================================================================

/// Live inventory feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// How often a subscription re-reads the collection to pick up writes
    /// made by other processes (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Buffered events per subscriber, and change-notification capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_poll_interval() -> u64 {
    2000
}
fn default_channel_capacity() -> usize {
    64
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            poll_interval_ms: default_poll_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl FeedSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub purchase: PurchaseSettings,

    #[serde(default)]
    pub feed: FeedSettings,
}

impl StoreConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (bookstock.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    DbError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
                })?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections and keys take defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::InvalidConfig(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }

        if self.purchase.max_attempts == 0 {
            return Err(DbError::InvalidConfig(
                "purchase.max_attempts must be at least 1".into(),
            ));
        }

        if self.purchase.timeout_secs == 0 {
            return Err(DbError::InvalidConfig(
                "purchase.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.purchase.initial_backoff_ms > self.purchase.max_backoff_ms {
            return Err(DbError::InvalidConfig(
                "purchase.initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        if self.feed.poll_interval_ms == 0 || self.feed.channel_capacity == 0 {
            return Err(DbError::InvalidConfig(
                "feed.poll_interval_ms and feed.channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BOOKSTOCK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(attempts) = lookup("BOOKSTOCK_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.purchase.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid BOOKSTOCK_MAX_ATTEMPTS"),
            }
        }

        if let Some(timeout) = lookup("BOOKSTOCK_PURCHASE_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(n) => self.purchase.timeout_secs = n,
                Err(_) => warn!(value = %timeout, "Ignoring invalid BOOKSTOCK_PURCHASE_TIMEOUT_SECS"),
            }
        }

        if let Some(poll) = lookup("BOOKSTOCK_FEED_POLL_MS") {
            match poll.parse::<u64>() {
                Ok(n) => self.feed.poll_interval_ms = n,
                Err(_) => warn!(value = %poll, "Ignoring invalid BOOKSTOCK_FEED_POLL_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bookstock", "bookstock")
            .map(|dirs| dirs.config_dir().join("bookstock.toml"))
    }

    /// Returns the platform data directory path for the database file.
    pub fn default_database_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bookstock", "bookstock")
            .map(|dirs| dirs.data_dir().join("bookstock.db"))
    }

    /// Pool configuration derived from these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .purchase(self.purchase.clone())
            .feed(self.feed.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
