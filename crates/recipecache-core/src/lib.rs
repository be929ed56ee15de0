//! Recipecache core library.
//!
//! Loads remote byte payloads, decodes them into typed values, persists them
//! to a local disk cache, and de-duplicates concurrent fetches of the same
//! resource across the process.
//!
//! A caller asks a [`ResourceCache`] for the box of a key; the box produces
//! its value from memory, then from disk, then from the network.

pub mod api;
pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod models;

pub use bytes::Bytes;

pub use api::{Fetch, FetchError, HttpFetcher};
pub use cache::{CacheKey, LoadStatus, Origin, ResourceBox, ResourceCache};
pub use config::Config;
pub use decode::{Decode, DecodeFn};
pub use error::{DecodeError, ResourceError};
