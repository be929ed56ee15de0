//! Keyed registry of resource boxes: one box per key, shared by every caller.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::disk;
use super::key::CacheKey;
use super::resource::ResourceBox;
use crate::api::{Fetch, FetchError, HttpFetcher};
use crate::decode::{self, DecodeFn};
use crate::error::{ResourceError, Result};

/// Type-erased view of a registered box.
pub trait AnyResource: Send + Sync {
    fn remote_url(&self) -> &Url;

    /// Name of the value type the box was registered with.
    fn value_type(&self) -> &'static str;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Send + Sync + 'static> AnyResource for ResourceBox<V> {
    fn remote_url(&self) -> &Url {
        ResourceBox::remote_url(self)
    }

    fn value_type(&self) -> &'static str {
        type_name::<V>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry mapping string keys to shared resource boxes.
///
/// Constructed explicitly and passed to whoever needs it; every lookup of the
/// same key returns the same box. The map lock is never held across I/O.
pub struct ResourceCache {
    cache_dir: PathBuf,
    fetcher: Arc<dyn Fetch>,
    resources: Mutex<HashMap<String, Arc<dyn AnyResource>>>,
}

impl ResourceCache {
    pub fn new(cache_dir: PathBuf, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            cache_dir,
            fetcher,
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by `reqwest` with the given request timeout.
    pub fn with_http(cache_dir: PathBuf, timeout: Duration) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::with_timeout(timeout)?;
        Ok(Self::new(cache_dir, Arc::new(fetcher)))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the cache file for `key` lives.
    pub fn cache_file(&self, key: &str) -> PathBuf {
        disk::cache_path(&self.cache_dir, key)
    }

    pub fn len(&self) -> usize {
        self.resources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.lock().is_empty()
    }

    /// Look up the box for `key`, creating it on first use.
    ///
    /// Every other accessor goes through here. A key already registered with
    /// a different value type is a [`ResourceError::TypeMismatch`].
    pub fn resource<V: Send + Sync + 'static>(
        &self,
        remote_url: Url,
        key: &str,
        decode: DecodeFn<V>,
    ) -> Result<Arc<ResourceBox<V>>> {
        let mut resources = self.resources.lock();

        if let Some(existing) = resources.get(key) {
            let registered = existing.value_type();
            return existing
                .clone()
                .into_any()
                .downcast::<ResourceBox<V>>()
                .map_err(|_| ResourceError::TypeMismatch {
                    key: key.to_string(),
                    registered,
                    requested: type_name::<V>(),
                });
        }

        let cache_file = self.cache_file(key);
        debug!(key, url = %remote_url, path = ?cache_file, "Registering resource");
        let resource = Arc::new(ResourceBox::new(
            remote_url,
            cache_file,
            decode,
            self.fetcher.clone(),
        ));
        resources.insert(key.to_string(), resource.clone());
        Ok(resource)
    }

    /// Box for a [`CacheKey`], registered under its local key.
    pub fn resource_for<V: Send + Sync + 'static>(
        &self,
        key: &CacheKey<V>,
    ) -> Result<Arc<ResourceBox<V>>> {
        self.resource(key.url().clone(), &key.local_key(), key.decode_fn())
    }

    /// Box whose payload is JSON.
    pub fn json<T>(&self, remote_url: Url, key: &str) -> Result<Arc<ResourceBox<T>>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.resource(remote_url, key, decode::json::<T>())
    }

    /// Box holding the raw response body (photos and other opaque blobs).
    pub fn bytes(&self, remote_url: Url, key: &str) -> Result<Arc<ResourceBox<Bytes>>> {
        self.resource(remote_url, key, decode::decoder::<Bytes>())
    }

    /// Delete the cache directory and everything in it.
    ///
    /// Boxes already handed out keep their in-memory values; only the files
    /// go. A fetch finishing concurrently may recreate the directory.
    pub fn clear_cache(&self) -> Result<()> {
        info!(path = ?self.cache_dir, "Clearing resource cache");
        disk::remove_all(&self.cache_dir).map_err(|e| ResourceError::persistence(&self.cache_dir, e))
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("cache_dir", &self.cache_dir)
            .field("resources", &self.len())
            .finish()
    }
}
