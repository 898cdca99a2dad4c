//! Cache protocol tests: memoization, lifetimes, invalidation, and
//! graceful degradation when the cache boundary is unreachable.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use viewable::cache::{CacheLifetime, MokaViewsCache, ViewsCache};
use viewable::config::ViewsConfig;
use viewable::crawler::NeverCrawler;
use viewable::models::{NewView, Period, Viewable, ViewableRef};
use viewable::storage::{MemoryViewStore, StorageResult, ViewStore};
use viewable::views::Views;
use viewable::visitor::{AnonymousVisitor, FixedVisitor};

struct Article {
    id: i64,
}

impl Viewable for Article {
    fn viewable_type(&self) -> &str {
        "article"
    }

    fn viewable_id(&self) -> i64 {
        self.id
    }
}

/// Wraps a store and counts aggregate queries, so tests can assert whether
/// a read was served from the cache or recomputed.
struct SpyStore {
    inner: MemoryViewStore,
    count_calls: AtomicUsize,
    sum_calls: AtomicUsize,
}

impl SpyStore {
    fn new() -> Self {
        Self {
            inner: MemoryViewStore::new(),
            count_calls: AtomicUsize::new(0),
            sum_calls: AtomicUsize::new(0),
        }
    }

    fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn sum_calls(&self) -> usize {
        self.sum_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ViewStore for SpyStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert(&self, view: NewView) -> StorageResult<i64> {
        self.inner.insert(view).await
    }

    async fn count(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
        unique_only: bool,
    ) -> Result<i64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(target, period, collection, unique_only).await
    }

    async fn sum_value(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
    ) -> Result<f64> {
        self.sum_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sum_value(target, period, collection).await
    }

    async fn exists_since(
        &self,
        target: &ViewableRef,
        collection: Option<&str>,
        visitor: &str,
        since: i64,
    ) -> Result<bool> {
        self.inner.exists_since(target, collection, visitor, since).await
    }

    async fn delete_for_viewable(&self, target: &ViewableRef) -> Result<u64> {
        self.inner.delete_for_viewable(target).await
    }
}

/// A cache boundary that is always unreachable.
struct BrokenCache;

#[async_trait]
impl ViewsCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<f64>> {
        Err(anyhow!("cache backend unreachable"))
    }

    async fn put(&self, _key: &str, _value: f64, _lifetime: CacheLifetime) -> Result<()> {
        Err(anyhow!("cache backend unreachable"))
    }

    async fn forget_prefix(&self, _prefix: &str) -> Result<()> {
        Err(anyhow!("cache backend unreachable"))
    }
}

fn engine(
    store: &Arc<SpyStore>,
    cache: Option<Arc<dyn ViewsCache>>,
    article_id: i64,
) -> Views {
    Views::new(
        Arc::clone(store) as Arc<dyn ViewStore>,
        Arc::new(AnonymousVisitor),
        Arc::new(NeverCrawler),
        cache,
        Arc::new(ViewsConfig::default()),
    )
    .for_viewable(&Article { id: article_id })
}

async fn seed(store: &Arc<SpyStore>, article_id: i64, visitors: &[&str]) {
    for visitor in visitors {
        let writer = Views::new(
            Arc::clone(store) as Arc<dyn ViewStore>,
            Arc::new(FixedVisitor::new(*visitor)),
            Arc::new(NeverCrawler),
            None,
            Arc::new(ViewsConfig::default()),
        )
        .for_viewable(&Article { id: article_id });
        assert!(writer.record().await.unwrap());
    }
}

#[tokio::test]
async fn second_remembered_count_skips_the_store() {
    let store = Arc::new(SpyStore::new());
    let cache: Arc<dyn ViewsCache> = Arc::new(MokaViewsCache::new(1024));
    seed(&store, 1, &["v1", "v2"]).await;

    let first = engine(&store, Some(Arc::clone(&cache)), 1)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));
    assert_eq!(first.count().await.unwrap(), 2);
    assert_eq!(store.count_calls(), 1);

    let second = engine(&store, Some(Arc::clone(&cache)), 1)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));
    assert_eq!(second.count().await.unwrap(), 2);
    // Identical filter set: served from cache, no new store query.
    assert_eq!(store.count_calls(), 1);
}

#[tokio::test]
async fn different_filter_sets_do_not_share_cache_entries() {
    let store = Arc::new(SpyStore::new());
    let cache: Arc<dyn ViewsCache> = Arc::new(MokaViewsCache::new(1024));
    seed(&store, 1, &["v1", "v1", "v2"]).await;

    let plain = engine(&store, Some(Arc::clone(&cache)), 1)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));
    assert_eq!(plain.count().await.unwrap(), 3);

    let unique = engine(&store, Some(Arc::clone(&cache)), 1)
        .unique(true)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));
    assert_eq!(unique.count().await.unwrap(), 2);

    assert_eq!(store.count_calls(), 2);

    // count and sum never collide either.
    let sum = engine(&store, Some(Arc::clone(&cache)), 1)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));
    assert_eq!(sum.value_sum().await.unwrap(), 3.0);
    assert_eq!(sum.value_sum().await.unwrap(), 3.0);
    assert_eq!(store.sum_calls(), 1);
}

#[tokio::test]
async fn destroy_forces_the_next_read_to_recompute() {
    let store = Arc::new(SpyStore::new());
    let cache: Arc<dyn ViewsCache> = Arc::new(MokaViewsCache::new(1024));
    seed(&store, 1, &["v1"]).await;

    let reader = engine(&store, Some(Arc::clone(&cache)), 1).remember_for(CacheLifetime::Forever);
    assert_eq!(reader.count().await.unwrap(), 1);
    assert_eq!(reader.count().await.unwrap(), 1);
    assert_eq!(store.count_calls(), 1);

    engine(&store, Some(Arc::clone(&cache)), 1)
        .destroy()
        .await
        .unwrap();

    let after = engine(&store, Some(Arc::clone(&cache)), 1).remember_for(CacheLifetime::Forever);
    assert_eq!(after.count().await.unwrap(), 0);
    assert_eq!(store.count_calls(), 2);
}

#[tokio::test]
async fn destroy_leaves_other_targets_cached() {
    let store = Arc::new(SpyStore::new());
    let cache: Arc<dyn ViewsCache> = Arc::new(MokaViewsCache::new(1024));
    seed(&store, 1, &["v1"]).await;
    seed(&store, 2, &["v1"]).await;

    let other = engine(&store, Some(Arc::clone(&cache)), 2).remember_for(CacheLifetime::Forever);
    assert_eq!(other.count().await.unwrap(), 1);
    assert_eq!(store.count_calls(), 1);

    engine(&store, Some(Arc::clone(&cache)), 1)
        .destroy()
        .await
        .unwrap();

    assert_eq!(other.count().await.unwrap(), 1);
    assert_eq!(store.count_calls(), 1);
}

#[tokio::test]
async fn expired_lifetime_recomputes() {
    let store = Arc::new(SpyStore::new());
    let cache: Arc<dyn ViewsCache> = Arc::new(MokaViewsCache::new(1024));
    seed(&store, 1, &["v1"]).await;

    // An already-past expiry instant: every read recomputes.
    let reader = engine(&store, Some(Arc::clone(&cache)), 1)
        .remember_for(CacheLifetime::Until(0));
    assert_eq!(reader.count().await.unwrap(), 1);
    assert_eq!(reader.count().await.unwrap(), 1);
    assert_eq!(store.count_calls(), 2);
}

#[tokio::test]
async fn unreachable_cache_degrades_to_direct_computation() {
    let store = Arc::new(SpyStore::new());
    seed(&store, 1, &["v1", "v2"]).await;

    let broken: Arc<dyn ViewsCache> = Arc::new(BrokenCache);
    let reader = engine(&store, Some(Arc::clone(&broken)), 1)
        .remember_for(CacheLifetime::For(Duration::from_secs(60)));

    // Reads succeed despite the cache failing on both get and put.
    assert_eq!(reader.count().await.unwrap(), 2);
    assert_eq!(reader.count().await.unwrap(), 2);
    assert_eq!(store.count_calls(), 2);
    assert_eq!(reader.value_sum().await.unwrap(), 2.0);

    // destroy still succeeds when invalidation fails.
    engine(&store, Some(broken), 1).destroy().await.unwrap();
    assert_eq!(
        engine(&store, None, 1).count().await.unwrap(),
        0
    );
}
