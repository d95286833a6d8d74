//! Hosted backend for Parley: the structured-data service's REST query
//! contract and its realtime websocket channel.
//!
//! [`RestBackend`] implements [`ChatBackend`](parley_core::backend::ChatBackend)
//! over `{url}/rest/v1` and opens one realtime socket per subscription.

mod client;
mod config;
mod query;
mod realtime;

pub mod error;

pub use client::RestBackend;
pub use config::RestConfig;
pub use error::{Error, Result};
