//! # bookstock-core: Pure Inventory Logic for Bookstock
//!
//! Book records, prices, and the stock-sufficiency decision behind a
//! checkout, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookstock Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (web UI)                            │   │
//! │  │    Inventory form ──► Online store ──► Cart ──► Checkout        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bookstock-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ purchase  │  │ validation│  │   │
//! │  │   │   Book    │  │   Money   │  │  Request  │  │   rules   │  │   │
//! │  │   │  NewBook  │  │  parsing  │  │   Plan    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                bookstock-db (Database Layer)                    │   │
//! │  │      SQLite, StockLedger transactions, live inventory feed      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Book, NewBook, BookUpdate
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`purchase`] - Request validation, duplicate merging, purchase planning
//! - [`error`] - PurchaseError and ValidationError
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use bookstock_core::purchase::{plan_purchase, PurchaseItem, PurchaseRequest};
//! use bookstock_core::PurchaseError;
//!
//! let request = PurchaseRequest::new(vec![PurchaseItem::new("missing", 1)]).unwrap();
//! let snapshot = HashMap::new();
//!
//! assert_eq!(
//!     plan_purchase(&request, &snapshot),
//!     Err(PurchaseError::NotFound("missing".to_string()))
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod purchase;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{PurchaseError, PurchaseResult, ValidationError};
pub use money::Money;
pub use purchase::{PurchaseItem, PurchaseReceipt, PurchaseRequest, ReceiptLine};
pub use types::*;
