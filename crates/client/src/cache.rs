//! Reference-data cache (countries, regions, avatar presets).
//!
//! Three-state cache-aside with request coalescing: a hit returns the
//! cached list, a miss with an in-flight fetch joins that fetch, and a cold
//! miss issues one fetch whose result populates the cache. Failures
//! propagate and are never cached, so the next caller retries.
//!
//! Avatar presets get a second tier: the last successful list is written
//! through to persistent storage, and a failed fetch falls back to it (or
//! an empty list, letting the UI degrade to initials).
//!
//! No TTL - data is considered valid for the lifetime of the authenticated
//! session and wiped on logout via [`PreloadService::clear`].

use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use mibu_core::CountryId;

use crate::api::{AvatarPreset, Country, ReferenceApi, Region};
use crate::storage::{self, KeyValueStore, keys};

/// Cached value types, one per reference resource.
#[derive(Debug, Clone)]
enum CacheValue {
    Countries(Arc<Vec<Country>>),
    Regions(Arc<Vec<Region>>),
    Avatars(Arc<Vec<AvatarPreset>>),
}

/// A reference-data fetch failed (and was not cached).
#[derive(Debug, Clone, Error)]
#[error("reference data fetch failed: {0}")]
pub struct PreloadError(String);

impl From<crate::error::ApiError> for PreloadError {
    fn from(err: crate::error::ApiError) -> Self {
        Self(err.to_string())
    }
}

const KEY_COUNTRIES: &str = "countries";
const KEY_AVATARS: &str = "avatars";

fn regions_key(country_id: &CountryId) -> String {
    format!("regions:{country_id}")
}

/// Cache and preloader for reference data.
#[derive(Clone)]
pub struct PreloadService {
    inner: Arc<PreloadServiceInner>,
}

struct PreloadServiceInner {
    api: Arc<dyn ReferenceApi>,
    storage: Arc<dyn KeyValueStore>,
    cache: Cache<String, CacheValue>,
}

impl PreloadService {
    /// Create a new preload service over the given API and storage.
    #[must_use]
    pub fn new(api: Arc<dyn ReferenceApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        let cache = Cache::builder().max_capacity(256).build();

        Self {
            inner: Arc::new(PreloadServiceInner {
                api,
                storage,
                cache,
            }),
        }
    }

    /// Get the country list, fetching once on cold cache.
    ///
    /// Concurrent callers while a fetch is in flight join the same fetch;
    /// exactly one request hits the network.
    ///
    /// # Errors
    ///
    /// Returns `PreloadError` when the fetch fails; the failure is not
    /// cached and the next call retries.
    #[instrument(skip(self))]
    pub async fn countries(&self) -> Result<Arc<Vec<Country>>, PreloadError> {
        let api = Arc::clone(&self.inner.api);
        let value = self
            .inner
            .cache
            .try_get_with(KEY_COUNTRIES.to_string(), async move {
                debug!("fetching countries");
                api.countries()
                    .await
                    .map(|list| CacheValue::Countries(Arc::new(list)))
                    .map_err(PreloadError::from)
            })
            .await
            .map_err(|e| PreloadError::clone(&e))?;

        match value {
            CacheValue::Countries(list) => Ok(list),
            _ => Err(PreloadError("cache key/value mismatch".to_string())),
        }
    }

    /// Get the regions of one country, fetching once per country on cold
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns `PreloadError` when the fetch fails; the failure is not
    /// cached and the next call retries.
    #[instrument(skip(self), fields(country_id = %country_id))]
    pub async fn regions(&self, country_id: &CountryId) -> Result<Arc<Vec<Region>>, PreloadError> {
        let api = Arc::clone(&self.inner.api);
        let id = country_id.clone();
        let value = self
            .inner
            .cache
            .try_get_with(regions_key(country_id), async move {
                debug!("fetching regions");
                api.regions(&id)
                    .await
                    .map(|list| CacheValue::Regions(Arc::new(list)))
                    .map_err(PreloadError::from)
            })
            .await
            .map_err(|e| PreloadError::clone(&e))?;

        match value {
            CacheValue::Regions(list) => Ok(list),
            _ => Err(PreloadError("cache key/value mismatch".to_string())),
        }
    }

    /// Get the avatar preset list.
    ///
    /// Never fails: a failed fetch falls back to the last successfully
    /// cached list in persistent storage, and to an empty list when none
    /// exists. Successful fetches are written through to storage so the
    /// fallback stays fresh.
    #[instrument(skip(self))]
    pub async fn avatar_presets(&self) -> Arc<Vec<AvatarPreset>> {
        let api = Arc::clone(&self.inner.api);
        let store = Arc::clone(&self.inner.storage);
        let result = self
            .inner
            .cache
            .try_get_with(KEY_AVATARS.to_string(), async move {
                debug!("fetching avatar presets");
                let list = api.avatar_presets().await.map_err(PreloadError::from)?;
                if let Err(e) = storage::set_json(store.as_ref(), keys::AVATAR_PRESETS, &list).await
                {
                    warn!(error = %e, "failed to persist avatar presets");
                }
                Ok::<_, PreloadError>(CacheValue::Avatars(Arc::new(list)))
            })
            .await;

        match result {
            Ok(CacheValue::Avatars(list)) => list,
            Ok(_) => Arc::new(Vec::new()),
            Err(e) => {
                warn!(error = %e, "avatar fetch failed, falling back to stored list");
                let stored: Option<Vec<AvatarPreset>> =
                    storage::get_json(self.inner.storage.as_ref(), keys::AVATAR_PRESETS)
                        .await
                        .unwrap_or_default();
                Arc::new(stored.unwrap_or_default())
            }
        }
    }

    /// Best-effort warm-up, fired immediately after login.
    ///
    /// Fetches countries and avatar presets concurrently and independently;
    /// errors are logged and swallowed (the relevant screen re-fetches on
    /// demand if warm-up failed).
    #[instrument(skip(self))]
    pub async fn preload_after_auth(&self) {
        let (countries, _avatars) = tokio::join!(self.countries(), self.avatar_presets());
        if let Err(e) = countries {
            warn!(error = %e, "country preload failed");
        }
    }

    /// Wipe all cached reference data; called on logout.
    pub async fn clear(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::ApiError;
    use crate::storage::MemoryStore;
    use mibu_core::AvatarId;

    /// Stub backend that counts fetches and can be set to fail.
    #[derive(Default)]
    struct StubApi {
        country_calls: AtomicUsize,
        avatar_calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl StubApi {
        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ApiError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ReferenceApi for StubApi {
        async fn countries(&self) -> Result<Vec<Country>, ApiError> {
            self.country_calls.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers pile up before resolving
            tokio::task::yield_now().await;
            self.check()?;
            Ok(vec![Country {
                id: CountryId::new("tw"),
                name: "Taiwan".to_string(),
                code: Some("TW".to_string()),
            }])
        }

        async fn regions(&self, country_id: &CountryId) -> Result<Vec<Region>, ApiError> {
            self.check()?;
            Ok(vec![Region {
                id: mibu_core::RegionId::new("taipei"),
                country_id: country_id.clone(),
                name: "Taipei".to_string(),
            }])
        }

        async fn avatar_presets(&self) -> Result<Vec<AvatarPreset>, ApiError> {
            self.avatar_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(vec![AvatarPreset {
                id: AvatarId::new("fox"),
                url: "https://cdn.mibu.app/avatars/fox.png".to_string(),
                name: None,
            }])
        }
    }

    fn service() -> (Arc<StubApi>, PreloadService) {
        let api = Arc::new(StubApi::default());
        let storage = Arc::new(MemoryStore::new());
        let service = PreloadService::new(api.clone(), storage);
        (api, service)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let (api, service) = service();

        let (a, b) = tokio::join!(service.countries(), service.countries());
        assert_eq!(api.country_calls.load(Ordering::SeqCst), 1);
        // Both callers see the same list
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let (api, service) = service();
        service.countries().await.unwrap();
        service.countries().await.unwrap();
        assert_eq!(api.country_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (api, service) = service();
        api.set_fail(true);
        assert!(service.countries().await.is_err());

        // Next call retries instead of returning a cached failure
        api.set_fail(false);
        let list = service.countries().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(api.country_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_regions_keyed_by_country() {
        let (_api, service) = service();
        let tw = service.regions(&CountryId::new("tw")).await.unwrap();
        assert_eq!(tw[0].country_id, CountryId::new("tw"));
        let jp = service.regions(&CountryId::new("jp")).await.unwrap();
        assert_eq!(jp[0].country_id, CountryId::new("jp"));
    }

    #[tokio::test]
    async fn test_avatar_fallback_to_stored_list() {
        let api = Arc::new(StubApi::default());
        let storage = Arc::new(MemoryStore::new());
        let service = PreloadService::new(api.clone(), storage.clone());

        // Warm fetch writes through to storage
        let fresh = service.avatar_presets().await;
        assert_eq!(fresh.len(), 1);

        // New service (cold memory cache) with a failing backend falls back
        let service = PreloadService::new(api.clone(), storage);
        api.set_fail(true);
        let fallback = service.avatar_presets().await;
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].id, AvatarId::new("fox"));
    }

    #[tokio::test]
    async fn test_avatar_degrades_to_empty_list() {
        let (api, service) = service();
        api.set_fail(true);
        let list = service.avatar_presets().await;
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let (api, service) = service();
        service.countries().await.unwrap();
        service.clear().await;
        service.countries().await.unwrap();
        assert_eq!(api.country_calls.load(Ordering::SeqCst), 2);
    }
}
