//! App Center HTTP client.
//!
//! Async client using `reqwest`. Control-plane calls carry the API token
//! header; upload-domain and blob calls go through a separate client
//! without it. Every call takes the [`RetryPolicy`] to apply.

pub mod client;
pub mod retry;

pub use client::{Client, ClientConfig, Error};
pub use retry::{Backoff, RetryPolicy};
