//! The views engine: orchestrates recording and aggregation.
//!
//! One engine instance serves one logical request. Configuration
//! accumulates builder-style on the instance; nothing touches storage or
//! the cache until a terminal operation (`count`, `value_sum`, `record`,
//! `destroy`) runs. Dependencies are injected explicitly through
//! [`Views::new`], keeping the engine free of process-wide state.

use crate::cache::{aggregate_key, target_prefix, CacheLifetime, ViewsCache};
use crate::config::ViewsConfig;
use crate::crawler::CrawlerDetector;
use crate::models::{NewView, Period, Viewable, ViewableRef};
use crate::storage::{StorageError, ViewStore};
use crate::visitor::Visitor;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ViewsError {
    #[error("no viewable target bound; call for_viewable() before terminal operations")]
    UnboundTarget,
    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl From<anyhow::Error> for ViewsError {
    fn from(e: anyhow::Error) -> Self {
        ViewsError::Persistence(StorageError::Other(e))
    }
}

/// Write-path deduplication window for repeat visits by one visitor.
#[derive(Debug, Clone, Copy)]
pub enum Cooldown {
    /// Suppress repeats within this long of the previous view.
    For(Duration),
    /// Suppress repeats at or after this unix instant; views before the
    /// floor do not count.
    Since(i64),
}

impl Cooldown {
    fn floor(&self, now: i64) -> i64 {
        match self {
            Cooldown::For(duration) => now - duration.as_secs() as i64,
            Cooldown::Since(instant) => *instant,
        }
    }
}

pub struct Views {
    store: Arc<dyn ViewStore>,
    visitor: Arc<dyn Visitor>,
    crawler: Arc<dyn CrawlerDetector>,
    cache: Option<Arc<dyn ViewsCache>>,
    config: Arc<ViewsConfig>,

    target: Option<ViewableRef>,
    period: Period,
    collection: Option<String>,
    unique_only: bool,
    remember: Option<CacheLifetime>,
    cooldown: Option<Cooldown>,
}

impl Views {
    pub fn new(
        store: Arc<dyn ViewStore>,
        visitor: Arc<dyn Visitor>,
        crawler: Arc<dyn CrawlerDetector>,
        cache: Option<Arc<dyn ViewsCache>>,
        config: Arc<ViewsConfig>,
    ) -> Self {
        Self {
            store,
            visitor,
            crawler,
            cache,
            config,
            target: None,
            period: Period::all(),
            collection: None,
            unique_only: false,
            remember: None,
            cooldown: None,
        }
    }

    /// Bind the viewable all further operations act on. The stored type
    /// name is resolved through the configured morph map.
    pub fn for_viewable(mut self, viewable: &dyn Viewable) -> Self {
        let stored_type = self
            .config
            .morph_map
            .resolve(viewable.viewable_type())
            .to_string();
        self.target = Some(ViewableRef::new(stored_type, viewable.viewable_id()));
        self
    }

    /// Restrict reads to a time period. Default is all time.
    pub fn period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    /// Scope to a named collection. Reads filter on it; records store it.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Count distinct visitors instead of rows. Ignored by `value_sum`.
    pub fn unique(mut self, state: bool) -> Self {
        self.unique_only = state;
        self
    }

    /// Memoize read results for the configured default lifetime.
    pub fn remember(self) -> Self {
        let lifetime = CacheLifetime::For(self.config.default_cache_lifetime);
        self.remember_for(lifetime)
    }

    /// Memoize read results for an explicit lifetime.
    pub fn remember_for(mut self, lifetime: CacheLifetime) -> Self {
        self.remember = Some(lifetime);
        self
    }

    /// Deduplicate repeat visits on the write path.
    pub fn cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    fn bound_target(&self) -> Result<&ViewableRef, ViewsError> {
        self.target.as_ref().ok_or(ViewsError::UnboundTarget)
    }

    /// Count views matching the configured filters. Returns 0 when nothing
    /// matches; never fails on "not found".
    pub async fn count(&self) -> Result<i64, ViewsError> {
        let target = self.bound_target()?;

        if let (Some(lifetime), Some(cache)) = (self.remember, self.cache.as_deref()) {
            let key = self.read_key(target, "count");
            if let Some(cached) = self.cache_get(cache, &key).await {
                return Ok(cached as i64);
            }

            let fresh = self
                .store
                .count(target, &self.period, self.collection.as_deref(), self.unique_only)
                .await?;
            self.cache_put(cache, &key, fresh as f64, lifetime).await;
            return Ok(fresh);
        }

        Ok(self
            .store
            .count(target, &self.period, self.collection.as_deref(), self.unique_only)
            .await?)
    }

    /// Sum the value column of matching views. The unique flag never
    /// applies here: summing distinct-visitor values is not well-defined
    /// for repeat visits carrying different values.
    pub async fn value_sum(&self) -> Result<f64, ViewsError> {
        let target = self.bound_target()?;

        if let (Some(lifetime), Some(cache)) = (self.remember, self.cache.as_deref()) {
            let key = self.read_key(target, "sum");
            if let Some(cached) = self.cache_get(cache, &key).await {
                return Ok(cached);
            }

            let fresh = self
                .store
                .sum_value(target, &self.period, self.collection.as_deref())
                .await?;
            self.cache_put(cache, &key, fresh, lifetime).await;
            return Ok(fresh);
        }

        Ok(self
            .store
            .sum_value(target, &self.period, self.collection.as_deref())
            .await?)
    }

    /// Record a plain view with weight 1.0 and no subject.
    pub async fn record(&self) -> Result<bool, ViewsError> {
        self.record_with(1.0, None).await
    }

    /// Record a view. Returns `Ok(true)` when a row was inserted and
    /// `Ok(false)` when the visit was suppressed (crawler or cooldown);
    /// suppression is a successful outcome, not an error.
    pub async fn record_with(&self, value: f64, user_id: Option<i64>) -> Result<bool, ViewsError> {
        let target = self.bound_target()?;

        if self.crawler.is_crawler() {
            debug!(
                viewable_type = %target.viewable_type,
                viewable_id = target.viewable_id,
                "view suppressed: crawler detected"
            );
            return Ok(false);
        }

        let visitor_id = self.visitor.visitor_id();
        let now = unix_now();

        let cooldown = self
            .cooldown
            .or(self.config.default_cooldown.map(Cooldown::For));

        // Cooldown needs a visitor identity to dedupe against; without one
        // every call is treated as unique.
        if let (Some(cooldown), Some(visitor)) = (cooldown, visitor_id.as_deref()) {
            let floor = cooldown.floor(now);
            let seen = self
                .store
                .exists_since(target, self.collection.as_deref(), visitor, floor)
                .await?;
            if seen {
                debug!(
                    viewable_type = %target.viewable_type,
                    viewable_id = target.viewable_id,
                    "view suppressed: within cooldown window"
                );
                return Ok(false);
            }
        }

        self.store
            .insert(NewView {
                viewable_type: target.viewable_type.clone(),
                viewable_id: target.viewable_id,
                visitor: visitor_id,
                collection: self.collection.clone(),
                value,
                user_id,
                viewed_at: now,
            })
            .await?;

        Ok(true)
    }

    /// Delete every view of the bound target, ignoring read filters, and
    /// invalidate all cached aggregates for it. Idempotent.
    pub async fn destroy(&self) -> Result<(), ViewsError> {
        let target = self.bound_target()?;

        let removed = self.store.delete_for_viewable(target).await?;
        debug!(
            viewable_type = %target.viewable_type,
            viewable_id = target.viewable_id,
            removed,
            "destroyed views"
        );

        if let Some(cache) = self.cache.as_deref() {
            let prefix = format!(
                "{}:",
                target_prefix(&self.config.cache_key_prefix, target)
            );
            if let Err(e) = cache.forget_prefix(&prefix).await {
                warn!("views cache invalidation failed after destroy: {e}");
            }
        }

        Ok(())
    }

    fn read_key(&self, target: &ViewableRef, op: &str) -> String {
        aggregate_key(
            &self.config.cache_key_prefix,
            target,
            &self.period,
            self.collection.as_deref(),
            self.unique_only,
            op,
        )
    }

    // Cache failures degrade to recomputation; the cache is never a
    // correctness dependency.
    async fn cache_get(&self, cache: &dyn ViewsCache, key: &str) -> Option<f64> {
        match cache.get(key).await {
            Ok(Some(value)) => {
                debug!(key, "views cache hit");
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("views cache read failed, recomputing: {e}");
                None
            }
        }
    }

    async fn cache_put(&self, cache: &dyn ViewsCache, key: &str, value: f64, lifetime: CacheLifetime) {
        if let Err(e) = cache.put(key, value, lifetime).await {
            warn!("views cache write failed: {e}");
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
