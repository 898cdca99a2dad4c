use crate::models::{NewView, Period, ViewableRef};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage constraint violation")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence abstraction over recorded views.
///
/// Views are append-only: the only write paths are [`ViewStore::insert`]
/// and the bulk [`ViewStore::delete_for_viewable`]. Period bounds are
/// inclusive on whichever sides are set.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Initialize the storage (create tables, indexes).
    async fn init(&self) -> Result<()>;

    /// Append a view row, returning the assigned id.
    async fn insert(&self, view: NewView) -> StorageResult<i64>;

    /// Count matching rows. With `unique_only`, counts distinct visitor
    /// identifiers instead; rows with a null visitor each count
    /// individually since null cannot be deduplicated against null.
    async fn count(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
        unique_only: bool,
    ) -> Result<i64>;

    /// Sum the value column of matching rows. Uniqueness never applies to
    /// sums.
    async fn sum_value(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
    ) -> Result<f64>;

    /// Cooldown probe: does a view by `visitor` exist at or after `since`?
    /// The collection filter matches the row a new insert would create, so
    /// `None` probes rows with a null collection.
    async fn exists_since(
        &self,
        target: &ViewableRef,
        collection: Option<&str>,
        visitor: &str,
        since: i64,
    ) -> Result<bool>;

    /// Remove every row for a target irrespective of filters. Returns the
    /// number of rows removed; deleting an empty set is a no-op.
    async fn delete_for_viewable(&self, target: &ViewableRef) -> Result<u64>;
}
