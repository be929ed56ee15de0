//! End-to-end tests of the resource cache against a local HTTP server.
//!
//! Hold the `TestServer` for the whole test: dropping it stops serving and
//! any further request will fail to connect.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{self, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use recipecache_core::models::Catalog;
use recipecache_core::{
    CacheKey, LoadStatus, Origin, ResourceBox, ResourceCache, ResourceError,
};
use tracing_subscriber::EnvFilter;
use url::Url;

const CATALOG: &str = r#"{"recipes": [
    {"cuisine": "Malaysian", "name": "Apam Balik", "uuid": "0c6ca6e7-e32a-4053-b824-1dbf749910d8",
     "photo_url_small": "http://localhost/photos/apam/small.jpg"},
    {"cuisine": "British", "name": "Apple & Blackberry Crumble", "uuid": "599344f4-3c5c-4cca-b914-2210e3b3312f"}
]}"#;

const MALFORMED: &str = r#"{"recipes": [{"cuisine": "British", "uuid": "599344f4-3c5c-4cca-b914-2210e3b3312f"}]}"#;

/// Route the crate's logs into the test output.
fn setup() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("recipecache_core=trace"))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Test server bound to a random local port, counting hits per path.
struct TestServer {
    addr: SocketAddr,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let hits = Arc::new(Mutex::new(BTreeMap::new()));

        let hitcounter = {
            let hits = hits.clone();
            move |req: Request, next: Next| {
                let hits = hits.clone();
                async move {
                    {
                        let mut hits = hits.lock().unwrap();
                        *hits.entry(req.uri().path().to_string()).or_default() += 1;
                    }
                    next.run(req).await
                }
            }
        };

        let router = Router::new()
            .route("/recipes.json", get(|| async { CATALOG }))
            .route("/recipes-empty.json", get(|| async { r#"{"recipes": []}"# }))
            .route("/recipes-malformed.json", get(|| async { MALFORMED }))
            .route(
                "/slow/recipes.json",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    CATALOG
                }),
            )
            .route(
                "/status/:code",
                get(|extract::Path(code): extract::Path<u16>| async move {
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                }),
            )
            .route(
                "/photos/*path",
                get(|| async { Bytes::from_static(b"\xff\xd8\xff\xe0fakejpeg") }),
            )
            .layer(middleware::from_fn(hitcounter));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, hits, handle }
    }

    fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.addr.port(), path)
            .parse()
            .unwrap()
    }

    fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn registry(dir: &Path) -> ResourceCache {
    ResourceCache::with_http(dir.join("cache"), Duration::from_secs(5)).unwrap()
}

fn catalog(cache: &ResourceCache, url: Url) -> Arc<ResourceBox<Catalog>> {
    cache.resource_for(&CacheKey::<Catalog>::for_type(url)).unwrap()
}

#[tokio::test]
async fn test_fetch_then_serve_from_disk() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let cache = registry(tmp.path());
    let fetched = catalog(&cache, server.url("recipes.json"))
        .await_value()
        .await
        .unwrap();
    assert_eq!(fetched.recipes.len(), 2);
    assert_eq!(fetched.cuisines, vec!["British", "Malaysian"]);
    assert_eq!(server.hits("/recipes.json"), 1);

    // A new process (fresh registry) finds the cache file and stays offline
    let cache = registry(tmp.path());
    let resource = catalog(&cache, server.url("recipes.json"));
    assert!(resource.is_cached());
    let from_disk = resource.load(false).unwrap();

    assert_eq!(*from_disk, *fetched);
    assert_eq!(resource.status(), LoadStatus::Loaded(Origin::Disk));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.hits("/recipes.json"), 1);
}

#[tokio::test]
async fn test_concurrent_awaits_make_one_request() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    let url = server.url("slow/recipes.json");
    let boxes: Vec<_> = (0..10).map(|_| catalog(&cache, url.clone())).collect();
    let results =
        futures::future::join_all(boxes.iter().map(|resource| resource.await_value())).await;

    assert_eq!(server.hits("/slow/recipes.json"), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
    }
}

#[tokio::test]
async fn test_non_200_status_is_transport_error() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    for code in [404u16, 500, 204] {
        let resource = catalog(&cache, server.url(&format!("status/{code}")));
        let err = resource.await_value().await.unwrap_err();
        match &err {
            ResourceError::Transport(fetch) => assert_eq!(fetch.status(), Some(code)),
            other => panic!("unexpected error for {code}: {other:?}"),
        }
        assert!(!resource.is_cached());
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    setup();
    let server = TestServer::start().await;
    let url = server.url("recipes.json");
    drop(server);
    tokio::task::yield_now().await;

    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());
    let err = catalog(&cache, url).await_value().await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_malformed_catalog_fails_and_is_not_cached() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    let resource = catalog(&cache, server.url("recipes-malformed.json"));
    let err = resource.await_value().await.unwrap_err();

    assert!(err.is_decode());
    assert_eq!(resource.status(), LoadStatus::Failed(err));
    assert!(resource.value().is_none());
    assert!(!resource.is_cached());
}

#[tokio::test]
async fn test_empty_catalog_loads() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    let empty = catalog(&cache, server.url("recipes-empty.json"))
        .await_value()
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_corrupt_cache_file_heals_from_network() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    let resource = catalog(&cache, server.url("recipes.json"));
    std::fs::create_dir_all(cache.cache_dir()).unwrap();
    std::fs::write(resource.cache_file(), b"<html>captive portal</html>").unwrap();

    let value = resource.await_value().await.unwrap();
    assert_eq!(value.recipes.len(), 2);
    assert_eq!(server.hits("/recipes.json"), 1);
    assert_eq!(std::fs::read(resource.cache_file()).unwrap(), CATALOG.as_bytes());
}

#[tokio::test]
async fn test_clear_cache_then_load_needs_new_fetch() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let cache = registry(tmp.path());
    catalog(&cache, server.url("recipes.json"))
        .await_value()
        .await
        .unwrap();
    cache.clear_cache().unwrap();
    assert!(!cache.cache_dir().exists());

    let cache = registry(tmp.path());
    let resource = catalog(&cache, server.url("recipes.json"));
    let mut changes = resource.subscribe();
    assert!(resource.load(false).is_none());

    changes.changed().await.unwrap();
    assert_eq!(resource.value().unwrap().recipes.len(), 2);
    assert_eq!(server.hits("/recipes.json"), 2);
}

#[tokio::test]
async fn test_photos_share_registry_with_catalog() {
    setup();
    let server = TestServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let cache = registry(tmp.path());

    let url = server.url("photos/apam/small.jpg");
    let key = CacheKey::<Bytes>::for_type(url.clone());
    let photo = cache.resource_for(&key).unwrap().await_value().await.unwrap();
    assert!(photo.starts_with(b"\xff\xd8"));

    // Same key, different type: loud failure instead of wrong data
    let err = cache
        .resource(url, &key.local_key(), recipecache_core::decode::json::<Catalog>())
        .unwrap_err();
    assert!(err.is_type_mismatch());
    assert_eq!(server.total_hits(), 1);
}
