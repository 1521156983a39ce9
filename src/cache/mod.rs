// src/cache/mod.rs
//! Degrade-safe cache for expensive external calls.
//!
//! Keys are `<prefix>:<operation>:<sha256(canonical json of args)>`. The store is
//! optional infrastructure: a miss, a store error, a timeout or a dead connection
//! all look the same to callers (no value), and writes are best-effort.
//!
//! Connection lifecycle is an explicit state machine:
//! `Unconnected { failures } -> Connecting -> Connected | Unconnected | Disabled`.
//! The first cache call connects lazily. A `get_or_compute` call resolves the
//! store once, so it makes at most one connect attempt. Only one attempt is in
//! flight at a time: calls arriving while it runs treat the cache as a miss.
//! After `max_connect_failures` consecutive failures the cache stays disabled
//! for the rest of the process.

pub mod store;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use store::{CacheEntry, CacheStore, MemoryStore, RedisConnector, StoreConnector, StoreError};

pub const DEFAULT_KEY_PREFIX: &str = "triage";

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key_prefix: String,
    /// Bound on every store round-trip (connect, get, set). Elapsed = miss / no-op.
    pub op_timeout: Duration,
    /// Consecutive failed connects before the cache disables itself.
    pub max_connect_failures: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            op_timeout: Duration::from_secs(2),
            max_connect_failures: 3,
        }
    }
}

enum ConnState {
    Unconnected { failures: u32 },
    Connecting { failures: u32 },
    Connected(Arc<dyn CacheStore>),
    Disabled,
}

impl ConnState {
    fn label(&self) -> &'static str {
        match self {
            ConnState::Unconnected { .. } => "unconnected",
            ConnState::Connecting { .. } => "connecting",
            ConnState::Connected(_) => "connected",
            ConnState::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub state: &'static str,
    pub backend: Option<String>,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

pub struct Cache {
    connector: Option<Arc<dyn StoreConnector>>,
    state: Mutex<ConnState>,
    settings: CacheSettings,
    counters: Counters,
}

impl Cache {
    pub fn new(connector: Option<Arc<dyn StoreConnector>>, settings: CacheSettings) -> Self {
        let state = match connector {
            Some(_) => ConnState::Unconnected { failures: 0 },
            None => ConnState::Disabled,
        };
        Self {
            connector,
            state: Mutex::new(state),
            settings,
            counters: Counters::default(),
        }
    }

    /// Cache with no store at all: every lookup misses, every write is a no-op.
    pub fn disabled() -> Self {
        Self::new(None, CacheSettings::default())
    }

    /// Convenience for tests and single-node runs.
    pub fn in_memory(store: MemoryStore) -> Self {
        Self::new(Some(Arc::new(store)), CacheSettings::default())
    }

    /// Stable key for `(operation, args)`. `None` if args cannot be serialized,
    /// in which case the call is simply not cached.
    pub fn key_for<A: Serialize + ?Sized>(&self, operation: &str, args: &A) -> Option<String> {
        // Going through `Value` sorts object keys, so field order never changes the key.
        let canonical = serde_json::to_value(args)
            .and_then(|v| serde_json::to_string(&v))
            .ok()?;
        let digest = Sha256::digest(canonical.as_bytes());
        let mut hex = String::with_capacity(64);
        for b in digest.iter() {
            let _ = write!(&mut hex, "{:02x}", b);
        }
        Some(format!("{}:{}:{}", self.settings.key_prefix, operation, hex))
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the live store handle, connecting lazily. The state lock is not
    /// held while connecting; concurrent callers get `None` until the attempt settles.
    async fn store(&self) -> Option<Arc<dyn CacheStore>> {
        let connector = self.connector.as_ref()?;
        let failures = {
            let mut state = self.lock_state();
            match &*state {
                ConnState::Connected(store) => return Some(Arc::clone(store)),
                ConnState::Disabled | ConnState::Connecting { .. } => return None,
                ConnState::Unconnected { failures } => {
                    let failures = *failures;
                    *state = ConnState::Connecting { failures };
                    failures
                }
            }
        };
        let mut attempt = ConnectAttempt {
            state: &self.state,
            failures,
            settled: false,
        };

        let outcome = tokio::time::timeout(self.settings.op_timeout, connector.connect()).await;
        let err = match outcome {
            Ok(Ok(store)) => {
                info!(backend = %connector.describe(), "cache store connected");
                attempt.settle(ConnState::Connected(Arc::clone(&store)));
                return Some(store);
            }
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(self.settings.op_timeout),
        };

        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        counter!("cache_errors_total").increment(1);
        let failures = failures + 1;
        if failures >= self.settings.max_connect_failures {
            warn!(
                backend = %connector.describe(),
                error = %err,
                failures,
                "cache store unreachable; caching disabled for this process"
            );
            attempt.settle(ConnState::Disabled);
        } else {
            warn!(
                backend = %connector.describe(),
                error = %err,
                failures,
                "cache store connect failed; computing without cache"
            );
            attempt.settle(ConnState::Unconnected { failures });
        }
        None
    }

    /// Fetch and decode a value. Misses, store errors and decode errors all yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store().await {
            Some(store) => self.read(store.as_ref(), key).await,
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Best-effort write; failures are logged and swallowed.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        if let Some(store) = self.store().await {
            self.write(store.as_ref(), key, value, ttl).await;
        }
    }

    async fn read<T: DeserializeOwned>(&self, store: &dyn CacheStore, key: &str) -> Option<T> {
        let raw = match tokio::time::timeout(self.settings.op_timeout, store.get(key)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.record_error("get", key, &e);
                None
            }
            Err(_) => {
                self.record_error("get", key, &StoreError::Timeout(self.settings.op_timeout));
                None
            }
        };
        let Some(raw) = raw else {
            self.record_miss();
            debug!(key = %short_key(key), "cache miss");
            return None;
        };
        match serde_json::from_str(&raw) {
            Ok(v) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                counter!("cache_hits_total").increment(1);
                debug!(key = %short_key(key), "cache hit");
                Some(v)
            }
            Err(e) => {
                self.record_error("decode", key, &StoreError::Codec(e.to_string()));
                self.record_miss();
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        store: &dyn CacheStore,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                self.record_error("encode", key, &StoreError::Codec(e.to_string()));
                return;
            }
        };
        match tokio::time::timeout(self.settings.op_timeout, store.set_ex(key, payload, ttl)).await
        {
            Ok(Ok(())) => debug!(key = %short_key(key), ttl_secs = ttl.as_secs(), "cache set"),
            Ok(Err(e)) => self.record_error("set", key, &e),
            Err(_) => self.record_error("set", key, &StoreError::Timeout(self.settings.op_timeout)),
        }
    }

    /// Explicit invalidation of one key. Returns whether something was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(store) = self.store().await else {
            return false;
        };
        match tokio::time::timeout(self.settings.op_timeout, store.delete(key)).await {
            Ok(Ok(removed)) => removed,
            Ok(Err(e)) => {
                self.record_error("delete", key, &e);
                false
            }
            Err(_) => false,
        }
    }

    /// Drop every cached entry of one operation (e.g. after a template change).
    pub async fn clear_operation(&self, operation: &str) -> u64 {
        let prefix = format!("{}:{}:", self.settings.key_prefix, operation);
        let Some(store) = self.store().await else {
            return 0;
        };
        match tokio::time::timeout(self.settings.op_timeout, store.delete_prefix(&prefix)).await {
            Ok(Ok(n)) => {
                info!(operation, removed = n, "cache operation cleared");
                n
            }
            Ok(Err(e)) => {
                self.record_error("clear", &prefix, &e);
                0
            }
            Err(_) => 0,
        }
    }

    /// Return the cached value for `(operation, args)` or compute, store and return it.
    /// Errors from `compute` are returned as-is and never cached.
    pub async fn get_or_compute<A, T, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key_for(operation, args);
        self.get_or_compute_keyed(key, ttl, compute).await
    }

    async fn get_or_compute_keyed<T, E, F, Fut>(
        &self,
        key: Option<String>,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(key) = key else {
            return compute().await;
        };
        // One store lookup per call: a failed connect skips both the read and the write.
        let store = self.store().await;
        match store.as_deref() {
            Some(store) => {
                if let Some(hit) = self.read::<T>(store, &key).await {
                    return Ok(hit);
                }
            }
            None => self.record_miss(),
        }
        let value = compute().await?;
        if let Some(store) = store.as_deref() {
            self.write(store, &key, &value, ttl).await;
        }
        Ok(value)
    }

    /// Wrap an async computation so every call goes through `get_or_compute`
    /// under `operation`, keyed by the call's argument.
    pub fn with_cache<F>(self: &Arc<Self>, operation: &'static str, ttl: Duration, f: F) -> CachedOp<F> {
        CachedOp {
            cache: Arc::clone(self),
            operation,
            ttl,
            f,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            enabled: !matches!(*state, ConnState::Disabled),
            state: state.label(),
            backend: self.connector.as_ref().map(|c| c.describe()),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!("cache_misses_total").increment(1);
    }

    fn record_error(&self, op: &'static str, key: &str, err: &StoreError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        counter!("cache_errors_total").increment(1);
        warn!(op, key = %short_key(key), error = %err, "cache store error; degrading to miss");
    }
}

/// Owns the `Connecting` state for one connect attempt. If the attempt is
/// dropped before it settles, the state falls back to `Unconnected`.
struct ConnectAttempt<'a> {
    state: &'a Mutex<ConnState>,
    failures: u32,
    settled: bool,
}

impl ConnectAttempt<'_> {
    fn settle(&mut self, next: ConnState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
        self.settled = true;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if matches!(*state, ConnState::Connecting { .. }) {
                *state = ConnState::Unconnected {
                    failures: self.failures,
                };
            }
        }
    }
}

/// An async function bound to a cache operation name and TTL.
pub struct CachedOp<F> {
    cache: Arc<Cache>,
    operation: &'static str,
    ttl: Duration,
    f: F,
}

impl<F> CachedOp<F> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.cache.key_for(self.operation, &args);
        self.cache
            .get_or_compute_keyed(key, self.ttl, || (self.f)(args))
            .await
    }
}

fn short_key(key: &str) -> &str {
    match key.char_indices().nth(40) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
