//! SQLite backend for the Rollcall attendance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every state transition runs as one
//! `IMMEDIATE` transaction on that thread, and partial unique indexes back the
//! per-offering and per-person invariants.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
