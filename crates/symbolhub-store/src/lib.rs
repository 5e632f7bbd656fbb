//! # symbolhub-store
//!
//! Catalog storage for SymbolHub, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the catalog: the
//! atomic post write and edit transactions, post projections with aggregated
//! tags, the tag vocabulary, accounts, and a weighted full-text search driven
//! by the `weighted_rank` SQL function registered on every connection.

pub mod database;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod rank;
pub mod search;
pub mod tags;
pub mod users;

mod error;

pub use database::Database;
pub use error::{ErrorKind, Result, StoreError};
pub use models::*;
