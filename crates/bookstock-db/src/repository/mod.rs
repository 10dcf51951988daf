//! # Repository Module
//!
//! Database repository implementations for Bookstock.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller (inventory form, seed tool, tests)                             │
//! │       │                                                                 │
//! │       │  db.books().update(id, &changes)                               │
//! │       ▼                                                                 │
//! │  BookRepository                                                        │
//! │  ├── insert(&self, new_book)                                           │
//! │  ├── get_by_id(&self, id) / get_many(&self, ids)                       │
//! │  ├── list(&self) / count(&self)                                        │
//! │  ├── update(&self, id, changes)                                        │
//! │  └── delete(&self, id)                                                 │
//! │       │                                                                 │
//! │       ├──► SQL against `books`                                         │
//! │       └──► BookChange on the broadcast channel (after each write)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock decrements for checkouts do not go through here; they belong to
//! [`crate::ledger::StockLedger`], which needs versioned writes inside one
//! transaction.
//!
//! ## Available Repositories
//!
//! - [`book::BookRepository`] - Book CRUD

pub mod book;
