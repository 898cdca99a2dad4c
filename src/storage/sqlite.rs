use crate::config::ViewsConfig;
use crate::models::{NewView, Period, ViewableRef};
use crate::storage::{StorageError, StorageResult, ViewStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteViewStore {
    pool: Arc<SqlitePool>,
    table: String,
}

impl SqliteViewStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
            table: "views".to_string(),
        })
    }

    /// Connect using the configured table name.
    pub async fn from_config(
        database_url: &str,
        max_connections: u32,
        config: &ViewsConfig,
    ) -> Result<Self> {
        Ok(Self::new(database_url, max_connections)
            .await?
            .with_table_name(config.table_name.clone()))
    }

    /// Override the table name (defaults to "views").
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn push_filters<'a>(
        builder: &mut QueryBuilder<'a, Sqlite>,
        target: &'a ViewableRef,
        period: &Period,
        collection: Option<&'a str>,
    ) {
        builder
            .push(" WHERE viewable_type = ")
            .push_bind(target.viewable_type.as_str());
        builder
            .push(" AND viewable_id = ")
            .push_bind(target.viewable_id);

        if let Some(start) = period.start() {
            builder.push(" AND viewed_at >= ").push_bind(start);
        }
        if let Some(end) = period.end() {
            builder.push(" AND viewed_at <= ").push_bind(end);
        }
        if let Some(name) = collection {
            builder.push(" AND collection = ").push_bind(name);
        }
    }
}

#[async_trait]
impl ViewStore for SqliteViewStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                viewable_type TEXT NOT NULL,
                viewable_id INTEGER NOT NULL,
                visitor TEXT,
                collection TEXT,
                value REAL NOT NULL DEFAULT 1.0,
                user_id INTEGER,
                viewed_at INTEGER NOT NULL
            )
            "#,
            table = self.table
        ))
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_viewable ON {table}(viewable_type, viewable_id)",
            table = self.table
        ))
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_visitor ON {table}(visitor)",
            table = self.table
        ))
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_viewed_at ON {table}(viewed_at)",
            table = self.table
        ))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert(&self, view: NewView) -> StorageResult<i64> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (viewable_type, viewable_id, visitor, collection, value, user_id, viewed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            table = self.table
        ))
        .bind(&view.viewable_type)
        .bind(view.viewable_id)
        .bind(&view.visitor)
        .bind(&view.collection)
        .bind(view.value)
        .bind(view.user_id)
        .bind(view.viewed_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                StorageError::Conflict
            } else {
                StorageError::Other(e.into())
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    async fn count(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
        unique_only: bool,
    ) -> Result<i64> {
        // Null visitors cannot be deduplicated against each other, so each
        // null-visitor row counts individually under unique_only.
        let select = if unique_only {
            "SELECT COUNT(DISTINCT visitor) + COALESCE(SUM(CASE WHEN visitor IS NULL THEN 1 ELSE 0 END), 0) FROM "
        } else {
            "SELECT COUNT(*) FROM "
        };

        let mut builder = QueryBuilder::<Sqlite>::new(select);
        builder.push(self.table.as_str());
        Self::push_filters(&mut builder, target, period, collection);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn sum_value(
        &self,
        target: &ViewableRef,
        period: &Period,
        collection: Option<&str>,
    ) -> Result<f64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(value), 0.0) FROM ");
        builder.push(self.table.as_str());
        Self::push_filters(&mut builder, target, period, collection);

        let sum: f64 = builder
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(sum)
    }

    async fn exists_since(
        &self,
        target: &ViewableRef,
        collection: Option<&str>,
        visitor: &str,
        since: i64,
    ) -> Result<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT EXISTS(SELECT 1 FROM ");
        builder.push(self.table.as_str());
        builder
            .push(" WHERE viewable_type = ")
            .push_bind(target.viewable_type.as_str());
        builder
            .push(" AND viewable_id = ")
            .push_bind(target.viewable_id);
        builder.push(" AND visitor = ").push_bind(visitor);
        builder.push(" AND viewed_at >= ").push_bind(since);

        // Match the row a new insert would create: an unset collection
        // probes null-collection rows only.
        match collection {
            Some(name) => {
                builder.push(" AND collection = ").push_bind(name);
            }
            None => {
                builder.push(" AND collection IS NULL");
            }
        }
        builder.push(")");

        let exists: i64 = builder
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(exists != 0)
    }

    async fn delete_for_viewable(&self, target: &ViewableRef) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE viewable_type = ? AND viewable_id = ?",
            table = self.table
        ))
        .bind(&target.viewable_type)
        .bind(target.viewable_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
