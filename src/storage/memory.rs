use crate::models::{NewView, Period, View, ViewableRef};
use crate::storage::{StorageResult, ViewStore};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

/// In-memory view store backed by a concurrent map, keyed per viewable.
///
/// Suitable for tests and embedded use; applies exactly the same filter
/// semantics as the SQL backends.
pub struct MemoryViewStore {
    rows: DashMap<ViewableRef, Vec<View>>,
    next_id: AtomicI64,
}

impl Default for MemoryViewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryViewStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn matches(view: &View, period: &Period, collection: Option<&str>) -> bool {
        if !period.contains(view.viewed_at) {
            return false;
        }
        match collection {
            Some(name) => view.collection.as_deref() == Some(name),
            None => true,
        }
    }
}

#[async_trait]
impl ViewStore for MemoryViewStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, view: NewView) -> StorageResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let target = ViewableRef::new(view.viewable_type.clone(), view.viewable_id);

        self.rows.entry(target).or_default().push(View {
            id,
            viewable_type: view.viewable_type,
            viewable_id: view.viewable_id,
            visitor: view.visitor,
            collection: view.collection,
            value: view.value,
            user_id: view.user_id,
            viewed_at: view.viewed_at,
        });

        Ok(id)
    }

    async fn count(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
        unique_only: bool,
    ) -> Result<i64> {
        let Some(rows) = self.rows.get(target) else {
            return Ok(0);
        };

        let matching = rows
            .iter()
            .filter(|v| Self::matches(v, period, collection));

        if unique_only {
            let mut visitors = HashSet::new();
            let mut anonymous = 0i64;
            for view in matching {
                match &view.visitor {
                    Some(visitor) => {
                        visitors.insert(visitor.clone());
                    }
                    // Null visitors cannot be deduplicated; each counts.
                    None => anonymous += 1,
                }
            }
            Ok(visitors.len() as i64 + anonymous)
        } else {
            Ok(matching.count() as i64)
        }
    }

    async fn sum_value(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
    ) -> Result<f64> {
        let Some(rows) = self.rows.get(target) else {
            return Ok(0.0);
        };

        Ok(rows
            .iter()
            .filter(|v| Self::matches(v, period, collection))
            .map(|v| v.value)
            .sum())
    }

    async fn exists_since(
        &self,
        target: &ViewableRef,
        collection: Option<&str>,
        visitor: &str,
        since: i64,
    ) -> Result<bool> {
        let Some(rows) = self.rows.get(target) else {
            return Ok(false);
        };

        Ok(rows.iter().any(|v| {
            v.visitor.as_deref() == Some(visitor)
                && v.viewed_at >= since
                && v.collection.as_deref() == collection
        }))
    }

    async fn delete_for_viewable(&self, target: &ViewableRef) -> Result<u64> {
        match self.rows.remove(target) {
            Some((_, rows)) => Ok(rows.len() as u64),
            None => Ok(0),
        }
    }
}
