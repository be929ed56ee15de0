//! Network-fetch module.
//!
//! This module provides the `Fetch` capability the cache uses to pull remote
//! payloads, and `HttpFetcher`, its `reqwest` implementation.
//!
//! A fetch is a single GET with no retries; anything but a 200 is an error.

pub mod client;
pub mod error;

pub use client::{Fetch, HttpFetcher, REQUEST_TIMEOUT_SECS};
pub use error::FetchError;
