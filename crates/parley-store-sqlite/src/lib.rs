//! SQLite backend for Parley.
//!
//! Stands in for the hosted data service during local development and tests.
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime, and publishes its own writes on an
//! in-process [`ChangeFeed`](parley_core::realtime::ChangeFeed) in place of
//! the hosted realtime channel.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
