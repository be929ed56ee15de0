//! Resource caching module.
//!
//! This module provides the `ResourceCache` registry and the `ResourceBox`
//! that owns one remote resource. A value is produced from memory, then from
//! the on-disk cache file, then from the network, in that order.
//!
//! - `CacheKey`: URL identity plus decoder, hashed into the cache file name
//! - `ResourceBox`: single-flight fetch state machine for one resource
//! - `ResourceCache`: one shared box per key for the whole process
//! - `disk`: cache file layout and persistence helpers

pub mod disk;
pub mod key;
pub mod registry;
pub mod resource;

pub use key::{djb2, CacheKey};
pub use registry::{AnyResource, ResourceCache};
pub use resource::{LoadStatus, Origin, ResourceBox};
