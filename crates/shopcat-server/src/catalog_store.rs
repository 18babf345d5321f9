//! Persistence seam for scraped catalogs.
//!
//! The scrape service only needs "load the stored catalog" and "record a
//! successful scrape"; keeping that behind a trait lets the streaming
//! pipeline run against an in-memory store in tests.

use async_trait::async_trait;
use shopcat_core::StoredCatalog;
use shopcat_db::DbError;
use sqlx::PgPool;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the persisted catalog for (user, origin), if any.
    async fn load(&self, user_id: i64, origin: &str) -> Result<Option<StoredCatalog>, DbError>;

    /// Persists a successful scrape and appends a history entry.
    async fn save(&self, user_id: i64, origin: &str, catalog: &StoredCatalog)
        -> Result<(), DbError>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn load(&self, user_id: i64, origin: &str) -> Result<Option<StoredCatalog>, DbError> {
        let row = shopcat_db::get_catalog(&self.pool, user_id, origin).await?;
        Ok(row.map(|r| r.catalog.0))
    }

    async fn save(
        &self,
        user_id: i64,
        origin: &str,
        catalog: &StoredCatalog,
    ) -> Result<(), DbError> {
        shopcat_db::record_scrape(&self.pool, user_id, origin, catalog).await?;
        Ok(())
    }
}
