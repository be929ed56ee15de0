use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

use crate::decode::{self, Decode, DecodeFn};

/// DJB2 seed.
const DJB2_SEED: u64 = 5381;

/// DJB2 rolling hash over the Unicode scalars of `s` (`h = h * 33 + c`).
///
/// Arithmetic wraps, so long URLs still produce a deterministic value.
///
/// [`CacheKey::local_key`] feeds it the parsed URL's serialization, which
/// `url` normalises (`https://host` becomes `https://host/`, the scheme and
/// host are lowercased). Callers that hash a raw string themselves must
/// normalise it the same way to get the same key.
pub fn djb2(s: &str) -> u64 {
    s.chars().fold(DJB2_SEED, |h, c| {
        h.wrapping_mul(33).wrapping_add(u64::from(u32::from(c)))
    })
}

/// Identity of a remote resource plus the function that decodes it.
///
/// Two keys are equal iff their URLs are equal; the decode function is not
/// part of the identity, so decoders registered for one URL must be
/// interchangeable.
pub struct CacheKey<V> {
    url: Url,
    decode: DecodeFn<V>,
}

impl<V> CacheKey<V> {
    pub fn new(url: Url, decode: DecodeFn<V>) -> Self {
        Self { url, decode }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn decode_fn(&self) -> DecodeFn<V> {
        self.decode.clone()
    }

    /// Registry key and cache file name: the DJB2 hash of the normalised URL
    /// in decimal.
    pub fn local_key(&self) -> String {
        djb2(self.url.as_str()).to_string()
    }
}

impl<V: Decode + 'static> CacheKey<V> {
    /// Key for a payload type that decodes itself.
    pub fn for_type(url: Url) -> Self {
        Self::new(url, decode::decoder::<V>())
    }
}

impl<V> Clone for CacheKey<V> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            decode: self.decode.clone(),
        }
    }
}

impl<V> PartialEq for CacheKey<V> {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl<V> Eq for CacheKey<V> {}

impl<V> Hash for CacheKey<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl<V> fmt::Debug for CacheKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("url", &self.url.as_str())
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}
