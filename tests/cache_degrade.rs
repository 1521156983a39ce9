// tests/cache_degrade.rs
//
// Cache semantics and degradation when the store misbehaves.
//
// Covered:
// - get_or_compute is idempotent for identical args (second call is a hit)
// - unreachable store -> fresh value, no error
// - cache disables itself after N failed connects and stops retrying
// - one call makes at most one connect attempt
// - concurrent calls share a single in-flight connect attempt
// - store command errors degrade to misses
// - TTL expiry, errors never cached
// - with_cache wrapper, delete and clear_operation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;

use feedback_triage::cache::{
    Cache, CacheSettings, CacheStore, MemoryStore, StoreConnector, StoreError,
};

const TTL: Duration = Duration::from_secs(60);

fn memory_cache() -> (Cache, MemoryStore) {
    let store = MemoryStore::new();
    (Cache::in_memory(store.clone()), store)
}

/// Connector whose every connect attempt fails.
#[derive(Default)]
struct DownConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl StoreConnector for DownConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Connect("connection refused".into()))
    }

    fn describe(&self) -> String {
        "down".into()
    }
}

/// Connector that fails after a delay, counting attempts.
struct SlowDownConnector {
    delay: Duration,
    attempts: AtomicUsize,
}

#[async_trait]
impl StoreConnector for SlowDownConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(StoreError::Connect("connection refused".into()))
    }

    fn describe(&self) -> String {
        "slow-down".into()
    }
}

/// Connects fine, then fails every command.
struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Command("READONLY".into()))
    }
    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Command("READONLY".into()))
    }
    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Command("READONLY".into()))
    }
    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, StoreError> {
        Err(StoreError::Command("READONLY".into()))
    }
}

struct BrokenConnector;

#[async_trait]
impl StoreConnector for BrokenConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        Ok(Arc::new(BrokenStore))
    }

    fn describe(&self) -> String {
        "broken".into()
    }
}

#[tokio::test]
async fn identical_args_compute_once() {
    let (cache, store) = memory_cache();
    let calls = AtomicUsize::new(0);
    let args = json!({"text": "no puedo cambiar el idioma", "category": "Operabilidad"});

    for _ in 0..2 {
        let v: String = cache
            .get_or_compute("enrich", &args, TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("descripción".to_string())
            })
            .await
            .expect("computed");
        assert_eq!(v, "descripción");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.len(), 1);
    let stats = cache.stats().await;
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.state, "connected");
}

#[tokio::test]
async fn unreachable_store_still_returns_fresh_value() {
    let cache = Cache::new(Some(Arc::new(DownConnector::default())), CacheSettings::default());

    let v: u32 = cache
        .get_or_compute("fetch", &("com.example", 30), TTL, || async { Ok::<_, ()>(42) })
        .await
        .expect("no error surfaces");

    assert_eq!(v, 42);
    assert!(cache.stats().await.errors >= 1);
}

#[tokio::test]
async fn disables_after_max_connect_failures() {
    let connector = Arc::new(DownConnector::default());
    let settings = CacheSettings {
        max_connect_failures: 3,
        ..CacheSettings::default()
    };
    let cache = Cache::new(Some(connector.clone() as Arc<dyn StoreConnector>), settings);

    for i in 0..6u32 {
        let v: u32 = cache
            .get_or_compute("op", &i, TTL, || async move { Ok::<_, ()>(i) })
            .await
            .expect("computed");
        assert_eq!(v, i);
    }

    // One connect per call until disabled; never again afterwards.
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
    let stats = cache.stats().await;
    assert!(!stats.enabled);
    assert_eq!(stats.state, "disabled");
}

#[tokio::test]
async fn one_call_makes_at_most_one_connect_attempt() {
    let connector = Arc::new(DownConnector::default());
    let settings = CacheSettings {
        max_connect_failures: 10,
        ..CacheSettings::default()
    };
    let cache = Cache::new(Some(connector.clone() as Arc<dyn StoreConnector>), settings);

    let v: u32 = cache
        .get_or_compute("op", &1u32, TTL, || async { Ok::<_, ()>(7) })
        .await
        .expect("computed");

    assert_eq!(v, 7);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    let stats = cache.stats().await;
    assert_eq!(stats.state, "unconnected");
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.errors, 1);
}

#[tokio::test]
async fn concurrent_calls_share_one_connect_attempt() {
    let connector = Arc::new(SlowDownConnector {
        delay: Duration::from_millis(300),
        attempts: AtomicUsize::new(0),
    });
    let settings = CacheSettings {
        op_timeout: Duration::from_secs(2),
        max_connect_failures: 3,
        ..CacheSettings::default()
    };
    let cache = Cache::new(Some(connector.clone() as Arc<dyn StoreConnector>), settings);

    let started = Instant::now();
    let calls = (0..5u32).map(|i| {
        let cache = &cache;
        async move {
            cache
                .get_or_compute("op", &i, TTL, || async move { Ok::<_, ()>(i * 10) })
                .await
        }
    });
    let values: Vec<u32> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.expect("computed"))
        .collect();
    let elapsed = started.elapsed();

    assert_eq!(values, vec![0, 10, 20, 30, 40]);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
    // The failed attempt settled back to unconnected, not disabled.
    let stats = cache.stats().await;
    assert_eq!(stats.state, "unconnected");
    assert!(stats.enabled);
}

#[tokio::test]
async fn store_command_errors_degrade_to_miss() {
    let cache = Cache::new(Some(Arc::new(BrokenConnector)), CacheSettings::default());
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let v: String = cache
            .get_or_compute("op", "k", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>("v".to_string())
            })
            .await
            .expect("computed");
        assert_eq!(v, "v");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.clear_operation("op").await, 0);
    assert!(!cache.delete("anything").await);
    assert!(cache.stats().await.enabled);
}

#[tokio::test]
async fn errors_are_not_cached() {
    let (cache, store) = memory_cache();

    let first: Result<String, &str> = cache
        .get_or_compute("enrich", "x", TTL, || async { Err("provider down") })
        .await;
    assert_eq!(first, Err("provider down"));
    assert!(store.is_empty());

    let second: Result<String, &str> = cache
        .get_or_compute("enrich", "x", TTL, || async { Ok("ok".to_string()) })
        .await;
    assert_eq!(second.as_deref(), Ok("ok"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (cache, _store) = memory_cache();
    let calls = AtomicUsize::new(0);
    let short = Duration::from_millis(50);

    let compute = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, ()>(1u8)
    };
    cache.get_or_compute("op", "k", short, compute).await.expect("first");
    tokio::time::sleep(Duration::from_millis(120)).await;
    cache.get_or_compute("op", "k", short, compute).await.expect("second");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn with_cache_wraps_an_async_fn() {
    let cache = Arc::new(Cache::in_memory(MemoryStore::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let double = cache.with_cache("double", TTL, move |x: u32| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<u32, String>(x * 2)
        }
    });

    assert_eq!(double.call(4).await, Ok(8));
    assert_eq!(double.call(4).await, Ok(8));
    assert_eq!(double.call(5).await, Ok(10));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn delete_and_clear_operation_invalidate() {
    let (cache, store) = memory_cache();
    for i in 0..3u32 {
        let key = cache.key_for("enrich", &i).expect("key");
        cache.set(&key, &i, TTL).await;
    }
    let fetch_key = cache.key_for("fetch", "app").expect("key");
    cache.set(&fetch_key, "page", TTL).await;
    assert_eq!(store.len(), 4);

    let first = cache.key_for("enrich", &0u32).expect("key");
    assert!(cache.delete(&first).await);
    assert!(!cache.delete(&first).await);
    assert_eq!(cache.clear_operation("enrich").await, 2);
    assert_eq!(store.len(), 1);
    assert_eq!(cache.get::<String>(&fetch_key).await.as_deref(), Some("page"));
}
