// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use futures_util::future::join_all;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::MovieApi;
use crate::config::CacheConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{Category, Movie, SeriesBundle};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::fetched_at(value, Instant::now(), ttl)
    }

    pub fn fetched_at(value: V, fetched_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            fetched_at,
            ttl,
        }
    }

    /// `None` when the TTL is too large to represent; such entries never expire.
    pub fn expires_at(&self) -> Option<Instant> {
        self.fetched_at.checked_add(self.ttl)
    }

    pub fn is_fresh(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => Instant::now() < expires_at,
            None => true,
        }
    }

    pub fn time_until_expiry(&self) -> Duration {
        match self.expires_at() {
            Some(expires_at) => expires_at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

/// How a cached read was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead<V> {
    /// Fresh entry, no network call.
    Hit(V),
    /// Fetched from the API and stored.
    Fetched(V),
    /// Fetch failed; an expired entry was served instead.
    Stale(V),
    /// Fetch failed and nothing was cached.
    Empty(V),
}

impl<V> CacheRead<V> {
    pub fn value(&self) -> &V {
        match self {
            Self::Hit(v) | Self::Fetched(v) | Self::Stale(v) | Self::Empty(v) => v,
        }
    }

    pub fn into_value(self) -> V {
        match self {
            Self::Hit(v) | Self::Fetched(v) | Self::Stale(v) | Self::Empty(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Stale(_) | Self::Empty(_))
    }
}

/// Item counts for status reporting.
pub trait CacheItems {
    fn item_count(&self) -> usize;
}

impl<T> CacheItems for Vec<T> {
    fn item_count(&self) -> usize {
        self.len()
    }
}

impl CacheItems for SeriesBundle {
    fn item_count(&self) -> usize {
        self.movies.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    pub fresh: bool,
    pub expires_in: Duration,
    pub items: usize,
}

/// In-memory read-through cache with a fixed time-to-live.
///
/// Entries never leave on their own: an expired entry stays until it is
/// replaced by a successful fetch or invalidated.
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Default,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the entry for `key` if fresh, otherwise fetch.
    ///
    /// Never fails: a failed fetch falls back to the expired entry, or to
    /// `V::default()` when there is none.
    pub async fn get<F, Fut>(&self, key: K, fetch: F) -> CacheRead<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<V>>,
    {
        let cached = self.lookup(&key);

        if let Some(entry) = &cached
            && entry.is_fresh()
        {
            debug!("{} cache hit for {:?}", self.name, key);
            return CacheRead::Hit(entry.value.clone());
        }

        debug!("{} cache miss for {:?}, fetching", self.name, key);
        let requested_at = Instant::now();
        match fetch().await {
            Ok(value) => {
                self.store(key, value.clone(), requested_at);
                CacheRead::Fetched(value)
            }
            Err(e) => {
                warn!("Failed to fetch {} for {:?}: {}", self.name, key, e);
                match cached {
                    Some(entry) => CacheRead::Stale(entry.value),
                    None => CacheRead::Empty(V::default()),
                }
            }
        }
    }

    /// Drop `key` and fetch it again.
    pub async fn refresh<F, Fut>(&self, key: K, fetch: F) -> CacheRead<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<V>>,
    {
        self.invalidate(Some(&key));
        self.get(key, fetch).await
    }

    /// Concurrent independent `get`s, one per key.
    pub async fn get_many<F, Fut>(&self, keys: &[K], fetch: F) -> HashMap<K, CacheRead<V>>
    where
        F: Fn(K) -> Fut,
        Fut: Future<Output = ApiResult<V>>,
    {
        let fetch = &fetch;
        let reads = keys.iter().cloned().map(move |key| async move {
            let read = self.get(key.clone(), || fetch(key.clone())).await;
            (key, read)
        });

        join_all(reads).await.into_iter().collect()
    }

    /// Remove one entry, or all entries when `key` is `None`.
    pub fn invalidate(&self, key: Option<&K>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        match key {
            Some(key) => {
                entries.remove(key);
                debug!("Cleared {} cache for {:?}", self.name, key);
            }
            None => {
                entries.clear();
                debug!("Cleared all {} cache entries", self.name);
            }
        }
    }

    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
        self.lookup(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn store(&self, key: K, value: V, fetched_at: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, CacheEntry::fetched_at(value, fetched_at, self.ttl));
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Default + CacheItems,
{
    pub fn status(&self) -> Vec<(K, EntryStatus)> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    EntryStatus {
                        fresh: entry.is_fresh(),
                        expires_in: entry.time_until_expiry(),
                        items: entry.value.item_count(),
                    },
                )
            })
            .collect()
    }

    pub fn total_items(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().map(|e| e.value.item_count()).sum::<usize>())
            .unwrap_or(0)
    }
}

/// The catalog read caches, one per resource family.
pub struct Catalog {
    api: Arc<MovieApi>,
    categories: TtlCache<(), Vec<Category>>,
    movies: TtlCache<String, Vec<Movie>>,
    series: TtlCache<String, SeriesBundle>,
}

impl Catalog {
    pub fn new(api: Arc<MovieApi>, config: &CacheConfig) -> Self {
        Self {
            api,
            categories: TtlCache::new("categories", config.categories_ttl()),
            movies: TtlCache::new("movies", config.movies_ttl()),
            series: TtlCache::new("series", config.series_ttl()),
        }
    }

    pub async fn categories(&self) -> CacheRead<Vec<Category>> {
        self.categories.get((), || self.api.categories()).await
    }

    pub async fn refresh_categories(&self) -> CacheRead<Vec<Category>> {
        self.categories.refresh((), || self.api.categories()).await
    }

    pub async fn movies_by_category(&self, category_id: &str) -> CacheRead<Vec<Movie>> {
        self.movies
            .get(category_id.to_string(), || {
                self.api.movies_by_category(category_id)
            })
            .await
    }

    pub async fn refresh_movies_by_category(&self, category_id: &str) -> CacheRead<Vec<Movie>> {
        self.movies
            .refresh(category_id.to_string(), || {
                self.api.movies_by_category(category_id)
            })
            .await
    }

    pub async fn movies_by_categories(
        &self,
        category_ids: &[String],
    ) -> HashMap<String, CacheRead<Vec<Movie>>> {
        let api = &self.api;
        self.movies
            .get_many(category_ids, |id| async move {
                api.movies_by_category(&id).await
            })
            .await
    }

    /// The series document and its movies, fetched together.
    pub async fn series_bundle(&self, series_id: &str) -> CacheRead<SeriesBundle> {
        let api = &self.api;
        self.series
            .get(series_id.to_string(), || async move {
                let (series, movies) =
                    tokio::try_join!(api.series(series_id), api.series_movies(series_id))?;
                Ok::<_, ApiError>(SeriesBundle {
                    series: Some(series),
                    movies,
                })
            })
            .await
    }

    pub fn invalidate_categories(&self) {
        self.categories.invalidate(None);
    }

    pub fn invalidate_movies(&self, category_id: Option<&str>) {
        let key = category_id.map(str::to_string);
        self.movies.invalidate(key.as_ref());
    }

    pub fn invalidate_series(&self, series_id: Option<&str>) {
        let key = series_id.map(str::to_string);
        self.series.invalidate(key.as_ref());
    }

    pub fn categories_cache(&self) -> &TtlCache<(), Vec<Category>> {
        &self.categories
    }

    pub fn movies_cache(&self) -> &TtlCache<String, Vec<Movie>> {
        &self.movies
    }

    pub fn series_cache(&self) -> &TtlCache<String, SeriesBundle> {
        &self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTransport, api_with};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: Duration = Duration::from_secs(60);

    fn catalog(transport: &ScriptedTransport) -> Catalog {
        let (api, _) = api_with(transport);
        Catalog::new(api, &CacheConfig::default())
    }

    fn categories_json() -> serde_json::Value {
        json!([{"_id": "c1", "name": "Action"}, {"_id": "c2", "name": "Drama"}])
    }

    #[tokio::test(start_paused = true)]
    async fn categories_follow_ten_minute_ttl() {
        let transport = ScriptedTransport::new();
        transport.respond("GET", "/category", 200, categories_json());
        let catalog = catalog(&transport);

        let first = catalog.categories().await;
        assert!(matches!(first, CacheRead::Fetched(_)));
        assert_eq!(transport.calls_to("/category"), 1);

        tokio::time::advance(5 * MINUTE).await;
        let second = catalog.categories().await;
        assert!(matches!(second, CacheRead::Hit(_)));
        assert_eq!(second.value(), first.value());
        assert_eq!(transport.calls_to("/category"), 1);

        tokio::time::advance(6 * MINUTE).await;
        let third = catalog.categories().await;
        assert!(matches!(third, CacheRead::Fetched(_)));
        assert_eq!(transport.calls_to("/category"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_issues_no_network_call() {
        let transport = ScriptedTransport::new();
        transport.respond("GET", "/category/c1/movies", 200, json!({"movies": [], "totalMovies": 0}));
        let catalog = catalog(&transport);

        catalog.movies_by_category("c1").await;
        catalog.movies_by_category("c1").await;

        assert_eq!(transport.calls_to("/category/c1/movies"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_served_when_refetch_fails() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "GET",
            "/category/c1/movies",
            200,
            json!({"movies": [{"_id": "m1", "title": "Alien"}], "totalMovies": 1}),
        );
        let catalog = catalog(&transport);
        catalog.movies_by_category("c1").await;

        tokio::time::advance(11 * MINUTE).await;
        transport.respond("GET", "/category/c1/movies", 503, json!({"message": "down"}));

        let read = catalog.movies_by_category("c1").await;
        assert!(read.is_degraded());
        assert!(matches!(&read, CacheRead::Stale(movies) if movies[0].id == "m1"));
        assert_eq!(transport.calls_to("/category/c1/movies"), 2);

        // The stale entry is still there for the next attempt.
        assert!(catalog.movies_cache().peek(&"c1".to_string()).is_some());
    }

    #[tokio::test]
    async fn failure_without_entry_yields_empty_default() {
        let transport = ScriptedTransport::new();
        transport.unreachable("GET", "/category");
        let catalog = catalog(&transport);

        let read = catalog.categories().await;
        assert_eq!(read, CacheRead::Empty(Vec::new()));
        assert!(catalog.categories_cache().is_empty());
    }

    #[tokio::test]
    async fn invalidate_removes_one_or_all() {
        let cache: TtlCache<String, Vec<u32>> = TtlCache::new("numbers", MINUTE);
        for key in ["a", "b"] {
            cache.get(key.to_string(), || async { Ok::<_, ApiError>(vec![1, 2]) }).await;
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_items(), 4);

        cache.invalidate(Some(&"a".to_string()));
        assert!(cache.peek(&"a".to_string()).is_none());
        assert_eq!(cache.len(), 1);

        cache.invalidate(None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn refresh_bypasses_fresh_entry() {
        let cache: TtlCache<(), Vec<u32>> = TtlCache::new("numbers", MINUTE);
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(vec![7])
        };

        cache.get((), fetch).await;
        let read = cache.refresh((), fetch).await;

        assert!(matches!(read, CacheRead::Fetched(_)));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn batch_reads_each_key_independently() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "GET",
            "/category/c1/movies",
            200,
            json!({"movies": [{"_id": "m1", "title": "Alien"}]}),
        );
        transport.unreachable("GET", "/category/c2/movies");
        let catalog = catalog(&transport);

        let ids = vec!["c1".to_string(), "c2".to_string()];
        let reads = catalog.movies_by_categories(&ids).await;

        assert_eq!(reads.len(), 2);
        assert!(matches!(reads["c1"], CacheRead::Fetched(_)));
        assert_eq!(reads["c2"], CacheRead::Empty(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn series_bundle_uses_five_minute_ttl() {
        let transport = ScriptedTransport::new();
        transport.respond("GET", "/series/s1", 200, json!({"_id": "s1", "name": "Middle-earth"}));
        transport.respond(
            "GET",
            "/series/s1/movies",
            200,
            json!({"movies": [{"_id": "m1", "title": "The Hobbit"}]}),
        );
        let catalog = catalog(&transport);

        let read = catalog.series_bundle("s1").await;
        assert_eq!(read.value().series.as_ref().unwrap().name, "Middle-earth");
        assert_eq!(read.value().movies.len(), 1);

        tokio::time::advance(4 * MINUTE).await;
        assert!(matches!(catalog.series_bundle("s1").await, CacheRead::Hit(_)));

        tokio::time::advance(2 * MINUTE).await;
        assert!(matches!(catalog.series_bundle("s1").await, CacheRead::Fetched(_)));
        assert_eq!(transport.calls_to("/series/s1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_freshness() {
        let cache: TtlCache<(), Vec<u32>> = TtlCache::new("numbers", 10 * MINUTE);
        cache.get((), || async { Ok::<_, ApiError>(vec![1, 2, 3]) }).await;

        tokio::time::advance(4 * MINUTE).await;
        let status = cache.status();
        assert_eq!(status.len(), 1);
        assert!(status[0].1.fresh);
        assert_eq!(status[0].1.expires_in, 6 * MINUTE);
        assert_eq!(status[0].1.items, 3);

        tokio::time::advance(7 * MINUTE).await;
        let status = cache.status();
        assert!(!status[0].1.fresh);
        assert_eq!(status[0].1.expires_in, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_ttl_never_expires() {
        let config = CacheConfig {
            categories_ttl_secs: u64::MAX,
            ..CacheConfig::default()
        };
        let cache: TtlCache<(), Vec<u32>> = TtlCache::new("categories", config.categories_ttl());
        let fetches = AtomicUsize::new(0);
        let counter = &fetches;
        let fetch = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(vec![1])
        };

        assert!(matches!(cache.get((), fetch).await, CacheRead::Fetched(_)));
        tokio::time::advance(365 * 24 * 60 * MINUTE).await;
        assert!(matches!(cache.get((), fetch).await, CacheRead::Hit(_)));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let status = cache.status();
        assert!(status[0].1.fresh);
        assert_eq!(status[0].1.expires_in, Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_age_counts_from_request_start() {
        let cache: TtlCache<(), Vec<u32>> = TtlCache::new("numbers", 10 * MINUTE);
        cache
            .get((), || async {
                tokio::time::sleep(2 * MINUTE).await;
                Ok::<_, ApiError>(vec![7])
            })
            .await;

        let status = cache.status();
        assert_eq!(status[0].1.expires_in, 8 * MINUTE);

        tokio::time::advance(8 * MINUTE).await;
        assert!(!cache.status()[0].1.fresh);
    }
}
