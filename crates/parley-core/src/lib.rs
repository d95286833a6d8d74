//! Core types and trait definitions for Parley conversation sync.
//!
//! This crate is deliberately free of HTTP and database dependencies. Backends
//! (`parley-store-sqlite`, `parley-rest`) and the session service
//! (`parley-chat`) all depend on it.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures in `backend.rs`.
#![allow(async_fn_in_trait)]

pub mod assessment;
pub mod backend;
pub mod conversation;
pub mod error;
pub mod message;
pub mod profile;
pub mod realtime;

pub use error::{Error, Result};
