// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bound-context cache (TTL + single-flight) and the provider
//! descriptor disk cache at `<cachePath>/providers/<name>.json`.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::provider::BoundProfileProvider;
use crate::wire::ProviderJson;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub profile_id: String,
    pub provider_name: String,
    pub profile_provider_cache_key: String,
    pub provider_cache_key: String,
}

struct CacheEntry {
    provider: Arc<BoundProfileProvider>,
    expires_at: Instant,
}

/// TTL cache of bound contexts, with a single-flight guard per key so
/// concurrent first binds for the same key don't each hit the registry.
pub struct BoundCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    ttl: Duration,
}

impl BoundCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    async fn fresh(&self, key: &CacheKey) -> Option<Arc<BoundProfileProvider>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.provider.clone())
    }

    /// Return the cached provider for `key` if still fresh; otherwise run
    /// `bind_fn` to produce one, caching the result with `expiresAt = now
    /// + ttl`. Concurrent callers for the same key block on the same
    /// in-flight guard rather than each running `bind_fn`.
    pub async fn get_or_bind<F, Fut, E>(
        &self,
        key: CacheKey,
        bind_fn: F,
    ) -> Result<Arc<BoundProfileProvider>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BoundProfileProvider, E>>,
    {
        if let Some(provider) = self.fresh(&key).await {
            return Ok(provider);
        }

        let guard = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _permit = guard.lock().await;

        if let Some(provider) = self.fresh(&key).await {
            return Ok(provider);
        }

        let provider = Arc::new(bind_fn().await?);
        self.entries.write().await.insert(
            key.clone(),
            CacheEntry {
                provider: provider.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.in_flight.lock().await.remove(&key);
        Ok(provider)
    }
}

/// Read a cached provider descriptor; `None` on any I/O or parse failure -
/// an absent or partial file is treated as a plain cache miss.
pub async fn read_provider_cache(cache_path: &Path, name: &str) -> Option<ProviderJson> {
    let path = cache_path.join("providers").join(format!("{name}.json"));
    let bytes = tokio::fs::read(&path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Best-effort write of a freshly fetched provider descriptor. Failures
/// are logged and swallowed per the documented recovery policy.
pub async fn write_provider_cache(cache_path: &Path, name: &str, provider: &ProviderJson) {
    let dir = cache_path.join("providers");
    if let Err(error) = tokio::fs::create_dir_all(&dir).await {
        tracing::warn!(%error, path = %dir.display(), "failed to create provider cache directory");
        return;
    }
    let bytes = match serde_json::to_vec_pretty(provider) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(%error, "failed to serialize provider descriptor for cache");
            return;
        }
    };
    let path = dir.join(format!("{name}.json"));
    if let Err(error) = tokio::fs::write(&path, bytes).await {
        tracing::warn!(%error, path = %path.display(), "failed to write provider cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(n: &str) -> CacheKey {
        CacheKey {
            profile_id: "acme/example".into(),
            provider_name: "acme".into(),
            profile_provider_cache_key: n.into(),
            provider_cache_key: n.into(),
        }
    }

    #[tokio::test]
    async fn provider_disk_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ProviderJson {
            name: "acme".into(),
            services: vec![crate::wire::ServiceJson {
                id: "default".into(),
                base_url: "https://api.acme.test".into(),
            }],
            default_service: "default".into(),
            security_schemes: vec![],
            parameters: vec![],
        };
        write_provider_cache(dir.path(), "acme", &provider).await;
        let read_back = read_provider_cache(dir.path(), "acme").await.unwrap();
        assert_eq!(read_back.name, "acme");
    }

    #[tokio::test]
    async fn missing_cache_file_is_a_plain_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_provider_cache(dir.path(), "nope").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_get_or_bind_only_runs_bind_fn_once() {
        let cache = Arc::new(BoundCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_bind::<_, _, BindErrorStub>(key("x"), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(stub_provider())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct BindErrorStub;

    fn stub_provider() -> BoundProfileProvider {
        crate::provider::tests::empty_bound_profile_provider()
    }
}
