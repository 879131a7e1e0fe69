use remote_object_store::MemoryObjectStore;
use s3_blob_provider::{
    BlobAccess, BlobAccessProvider, BlobProviderError, BlobReference, CachePolicy,
    ProviderConfig, SimpleBlobProvider, UsageHint,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn config(root: &Path) -> ProviderConfig {
    ProviderConfig {
        cache_root: root.to_path_buf(),
        ..ProviderConfig::default()
    }
}

fn staging_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect()
}

#[tokio::test]
async fn second_resolve_is_a_metadata_only_hit() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert_with_etag("abc123", &b"0123456789"[..], "\"e1\"");
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store.clone()).unwrap();
    let blob = BlobReference::parse("doc:abc123").unwrap();

    let first = provider.resolve(&blob).await.unwrap();
    assert_eq!(std::fs::read(first.path()).unwrap(), b"0123456789");

    let second = provider.resolve(&blob).await.unwrap();
    assert_eq!(second.path(), first.path());
    assert_eq!(store.fetch_count(), 2);
    assert_eq!(store.body_reads(), 1);

    let stats = provider.cache().stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn direct_url_carries_response_headers() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store.clone()).unwrap();
    let blob = BlobReference::parse("doc:videos/clip.mov")
        .unwrap()
        .with_filename("clip.mov")
        .with_mime_type("video/quicktime")
        .with_encoding("");

    let direct = provider
        .issue_direct_url(&blob, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    let params: HashMap<String, String> = direct.url.query_pairs().into_owned().collect();
    assert_eq!(params["response-content-type"], "video/quicktime");
    assert_eq!(
        params["response-content-disposition"],
        "attachment; filename*=UTF-8''clip.mov"
    );
    assert_eq!(params["X-Amz-Expires"], "60");
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(provider.cache().stats().await.entries, 0);
}

#[tokio::test]
async fn download_is_cached_when_direct_access_is_disabled() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("abc123", &b"0123456789"[..]);
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store).unwrap();
    let blob = BlobReference::parse("doc:abc123").unwrap();

    let access = provider.access(&blob, UsageHint::Download).await.unwrap();
    match access {
        BlobAccess::Cached(cached) => assert_eq!(cached.size(), 10),
        other => panic!("expected cached access, got {:?}", other),
    }
    assert!(provider
        .direct_uri(&blob, UsageHint::Download)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn writes_always_fail() {
    let root = tempdir().unwrap();
    let provider = SimpleBlobProvider::initialize(
        "doc",
        config(root.path()),
        Arc::new(MemoryObjectStore::new()),
    )
    .unwrap();

    for content in [None, Some(&b""[..]), Some(&b"payload"[..])] {
        assert!(matches!(
            provider.write_blob(content),
            Err(BlobProviderError::UnsupportedOperation(_))
        ));
    }
}

#[tokio::test]
async fn zero_bound_cache_still_serves_content() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("a", &b"first"[..]);
    store.insert("b", &b"second"[..]);
    let config = ProviderConfig {
        cache_policy: CachePolicy::new(0, 0, Duration::ZERO),
        ..config(root.path())
    };
    let provider = SimpleBlobProvider::initialize("doc", config, store.clone()).unwrap();

    for (key, content) in [("doc:a", &b"first"[..]), ("doc:b", &b"second"[..])] {
        let blob = BlobReference::parse(key).unwrap();
        let cached = provider.resolve(&blob).await.unwrap();
        assert_eq!(std::fs::read(cached.path()).unwrap(), content);
        assert_eq!(provider.cache().stats().await.entries, 0);
    }

    let stats = provider.cache().stats().await;
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.total_size, 0);
}

#[tokio::test]
async fn min_age_keeps_recent_entries_over_bounds() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("a", vec![1u8; 100]);
    store.insert("b", vec![2u8; 100]);
    let config = ProviderConfig {
        cache_policy: CachePolicy::new(150, 10, Duration::from_secs(3600)),
        ..config(root.path())
    };
    let provider = SimpleBlobProvider::initialize("doc", config, store).unwrap();

    for key in ["doc:a", "doc:b"] {
        provider
            .resolve(&BlobReference::parse(key).unwrap())
            .await
            .unwrap();
    }

    let stats = provider.cache().stats().await;
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.total_size, 200);
    assert_eq!(stats.evictions, 0);
}

#[tokio::test]
async fn concurrent_resolves_stage_once() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new().with_chunk_size(16));
    store.insert("abc123", vec![9u8; 8192]);
    let provider = Arc::new(
        SimpleBlobProvider::initialize("doc", config(root.path()), store.clone()).unwrap(),
    );
    let blob = BlobReference::parse("doc:abc123").unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let blob = blob.clone();
            tokio::spawn(async move { provider.resolve(&blob).await })
        })
        .collect();

    let mut paths = Vec::new();
    for task in tasks {
        paths.push(task.await.unwrap().unwrap().path().to_path_buf());
    }

    assert!(paths.iter().all(|p| p == &paths[0]));
    assert_eq!(store.body_reads(), 1);
    assert_eq!(provider.cache().stats().await.entries, 1);
}

#[tokio::test]
async fn broken_body_leaves_no_staging_files() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new().with_chunk_size(3));
    store.insert("abc123", &b"0123456789"[..]);
    store.break_body("abc123", 6);
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store).unwrap();

    let err = provider
        .resolve(&BlobReference::parse("doc:abc123").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, BlobProviderError::RemoteUnavailable { .. }));
    assert_eq!(err.key(), Some("abc123"));
    assert!(staging_files(provider.cache().dir()).is_empty());
    assert_eq!(provider.cache().stats().await.entries, 0);
}

#[tokio::test]
async fn missing_object_is_never_cached() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store.clone()).unwrap();
    let blob = BlobReference::parse("doc:missing").unwrap();

    let err = provider.resolve(&blob).await.unwrap_err();
    assert!(matches!(err, BlobProviderError::ObjectNotFound { .. }));

    store.set_unavailable(true);
    let err = provider.resolve(&blob).await.unwrap_err();
    assert!(matches!(err, BlobProviderError::RemoteUnavailable { .. }));

    assert_eq!(provider.cache().stats().await.entries, 0);
}

#[tokio::test]
async fn cache_dir_loss_is_a_write_failure() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("abc123", &b"0123456789"[..]);
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store).unwrap();

    std::fs::remove_dir_all(provider.cache().dir()).unwrap();

    let err = provider
        .resolve(&BlobReference::parse("doc:abc123").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BlobProviderError::CacheWriteFailed { .. }));
    assert_eq!(provider.cache().stats().await.entries, 0);
}

#[tokio::test]
async fn close_tears_down_cache_dir() {
    let root = tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("abc123", &b"0123456789"[..]);
    let provider = SimpleBlobProvider::initialize("doc", config(root.path()), store).unwrap();

    let blob = BlobReference::parse("doc:abc123").unwrap();
    let held = provider.resolve(&blob).await.unwrap();
    let dir = provider.cache().dir().to_path_buf();

    provider.close().await.unwrap();
    assert!(!dir.exists());
    assert!(held.is_retired());

    let err = provider.resolve(&blob).await.unwrap_err();
    assert!(matches!(err, BlobProviderError::CacheWriteFailed { .. }));
}
