//! Persisted catalogs (`scraped_catalogs`) and `scrape_history`.

use chrono::{DateTime, Utc};
use shopcat_core::StoredCatalog;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::stores::StoreRow;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `scraped_catalogs`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCatalogRow {
    pub store_id: i64,
    pub catalog: Json<StoredCatalog>,
    pub scraped_at: DateTime<Utc>,
}

/// A row from `scrape_history`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeHistoryRow {
    pub id: i64,
    pub store_id: i64,
    pub product_count: i32,
    pub collection_count: i32,
    pub scraped_at: DateTime<Utc>,
}

fn count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Persists a successful scrape for (user, origin) in one transaction:
/// registers the store if needed, updates its counts, replaces the stored
/// catalog and appends a history entry.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written then.
pub async fn record_scrape(
    pool: &PgPool,
    user_id: i64,
    origin: &str,
    catalog: &StoredCatalog,
) -> Result<StoreRow, DbError> {
    let product_count = count(catalog.products.len());
    let collection_count = count(catalog.collections.len());

    let mut tx = pool.begin().await?;

    let store = sqlx::query_as::<_, StoreRow>(
        "INSERT INTO stores (public_id, user_id, origin, product_count, collection_count, \
                             last_scraped_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (user_id, origin) DO UPDATE \
         SET product_count = EXCLUDED.product_count, \
             collection_count = EXCLUDED.collection_count, \
             last_scraped_at = EXCLUDED.last_scraped_at \
         RETURNING id, public_id, user_id, origin, product_count, collection_count, \
                   last_scraped_at, created_at",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(user_id)
    .bind(origin)
    .bind(product_count)
    .bind(collection_count)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO scraped_catalogs (store_id, catalog, scraped_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (store_id) DO UPDATE \
         SET catalog = EXCLUDED.catalog, scraped_at = EXCLUDED.scraped_at",
    )
    .bind(store.id)
    .bind(Json(catalog))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO scrape_history (store_id, product_count, collection_count) \
         VALUES ($1, $2, $3)",
    )
    .bind(store.id)
    .bind(product_count)
    .bind(collection_count)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        user_id,
        origin,
        products = product_count,
        collections = collection_count,
        "recorded scrape"
    );
    Ok(store)
}

/// Returns the persisted catalog for (user, origin), if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query or JSON decode fails.
pub async fn get_catalog(
    pool: &PgPool,
    user_id: i64,
    origin: &str,
) -> Result<Option<StoredCatalogRow>, DbError> {
    let row = sqlx::query_as::<_, StoredCatalogRow>(
        "SELECT c.store_id, c.catalog, c.scraped_at \
         FROM scraped_catalogs c \
         JOIN stores s ON s.id = c.store_id \
         WHERE s.user_id = $1 AND s.origin = $2",
    )
    .bind(user_id)
    .bind(origin)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Deletes the persisted catalog for (user, origin). The store row and its
/// history are kept. Returns whether a catalog was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear_catalog(pool: &PgPool, user_id: i64, origin: &str) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM scraped_catalogs c USING stores s \
         WHERE s.id = c.store_id AND s.user_id = $1 AND s.origin = $2",
    )
    .bind(user_id)
    .bind(origin)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent scrapes of (user, origin), newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_history(
    pool: &PgPool,
    user_id: i64,
    origin: &str,
    limit: i64,
) -> Result<Vec<ScrapeHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeHistoryRow>(
        "SELECT h.id, h.store_id, h.product_count, h.collection_count, h.scraped_at \
         FROM scrape_history h \
         JOIN stores s ON s.id = h.store_id \
         WHERE s.user_id = $1 AND s.origin = $2 \
         ORDER BY h.scraped_at DESC, h.id DESC \
         LIMIT $3",
    )
    .bind(user_id)
    .bind(origin)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
