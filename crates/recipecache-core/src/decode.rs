//! Turning fetched bytes into typed values.
//!
//! The only thing the cache asks of a payload type is "construct from raw
//! bytes or fail with a [`DecodeError`]". That is either a [`Decode`] impl or
//! an ad-hoc [`DecodeFn`] closure.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::DecodeError;

/// Shared decode function from raw bytes to `V`.
pub type DecodeFn<V> = Arc<dyn Fn(&[u8]) -> Result<V, DecodeError> + Send + Sync>;

/// Payload types that know how to build themselves from raw bytes.
pub trait Decode: Sized {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
}

impl Decode for Bytes {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// Decode function for a [`Decode`] type.
pub fn decoder<V: Decode + 'static>() -> DecodeFn<V> {
    Arc::new(V::decode)
}

/// Decode function that parses the bytes as JSON.
pub fn json<T: DeserializeOwned + 'static>() -> DecodeFn<T> {
    Arc::new(|bytes: &[u8]| serde_json::from_slice(bytes).map_err(DecodeError::from))
}
