//! Memoization of aggregation results.
//!
//! The cache is an optimization, never a correctness dependency: the engine
//! treats any adapter failure as a miss and recomputes from the store. Keys
//! carry a per-target prefix so `destroy()` can invalidate every cached
//! aggregate for a viewable without enumerating filter combinations.

use crate::models::{Period, ViewableRef};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use moka::sync::Cache;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long a cached aggregate stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLifetime {
    /// Expire this long after the value is stored.
    For(Duration),
    /// Expire at a fixed unix instant.
    Until(i64),
    /// Never expire automatically; only manual invalidation removes it.
    Forever,
}

impl CacheLifetime {
    fn expires_at(&self, now: i64) -> Option<i64> {
        match self {
            CacheLifetime::For(duration) => Some(now + duration.as_secs() as i64),
            CacheLifetime::Until(instant) => Some(*instant),
            CacheLifetime::Forever => None,
        }
    }
}

/// Key-value contract the engine memoizes through. Values are the numeric
/// aggregate results; one f64 surface covers both counts and sums.
#[async_trait]
pub trait ViewsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<f64>>;

    async fn put(&self, key: &str, value: f64, lifetime: CacheLifetime) -> Result<()>;

    /// Drop every entry whose key starts with `prefix`.
    async fn forget_prefix(&self, prefix: &str) -> Result<()>;
}

/// Deterministic cache key for one aggregation request. The lifetime is
/// deliberately not part of the key: two reads with different lifetimes
/// over the same filter set share a result.
pub fn aggregate_key(
    namespace: &str,
    target: &ViewableRef,
    period: &Period,
    collection: Option<&str>,
    unique_only: bool,
    op: &str,
) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        target_prefix(namespace, target),
        op,
        period.start().map_or_else(|| "-".to_string(), |t| t.to_string()),
        period.end().map_or_else(|| "-".to_string(), |t| t.to_string()),
        collection.unwrap_or("-"),
        unique_only,
    )
}

/// Prefix shared by every key for one viewable; what `destroy()` forgets.
pub fn target_prefix(namespace: &str, target: &ViewableRef) -> String {
    format!(
        "{}:{}:{}",
        namespace, target.viewable_type, target.viewable_id
    )
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: f64,
    expires_at: Option<i64>,
}

/// In-process cache adapter on moka.
///
/// Lifetimes vary per call, so expiry is stored with each entry and checked
/// on read instead of using a cache-wide TTL.
pub struct MokaViewsCache {
    cache: Cache<String, CacheEntry>,
}

impl MokaViewsCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .support_invalidation_closures()
            .build();
        Self { cache }
    }
}

#[async_trait]
impl ViewsCache for MokaViewsCache {
    async fn get(&self, key: &str) -> Result<Option<f64>> {
        let Some(entry) = self.cache.get(key) else {
            return Ok(None);
        };

        if let Some(expires_at) = entry.expires_at {
            if unix_now() > expires_at {
                self.cache.invalidate(key);
                return Ok(None);
            }
        }

        Ok(Some(entry.value))
    }

    async fn put(&self, key: &str, value: f64, lifetime: CacheLifetime) -> Result<()> {
        let entry = CacheEntry {
            value,
            expires_at: lifetime.expires_at(unix_now()),
        };
        self.cache.insert(key.to_string(), entry);
        Ok(())
    }

    async fn forget_prefix(&self, prefix: &str) -> Result<()> {
        let prefix = prefix.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map_err(|e| anyhow!("cache invalidation predicate rejected: {e}"))?;
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
