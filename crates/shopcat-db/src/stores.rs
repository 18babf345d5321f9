//! Database operations for the per-user `stores` registry.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub origin: String,
    pub product_count: i32,
    pub collection_count: i32,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const STORE_COLUMNS: &str = "id, public_id, user_id, origin, product_count, collection_count, \
                             last_scraped_at, created_at";

/// Registers `origin` for the user. Adding an origin that is already
/// registered returns the existing row unchanged.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn add_store(pool: &PgPool, user_id: i64, origin: &str) -> Result<StoreRow, DbError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let sql = format!(
        "INSERT INTO stores (public_id, user_id, origin) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, origin) DO UPDATE SET origin = EXCLUDED.origin \
         RETURNING {STORE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, StoreRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(origin)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Lists the user's stores, most recently scraped first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stores(pool: &PgPool, user_id: i64) -> Result<Vec<StoreRow>, DbError> {
    let sql = format!(
        "SELECT {STORE_COLUMNS} FROM stores WHERE user_id = $1 \
         ORDER BY last_scraped_at DESC NULLS LAST, created_at DESC"
    );
    let rows = sqlx::query_as::<_, StoreRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_store_by_origin(
    pool: &PgPool,
    user_id: i64,
    origin: &str,
) -> Result<Option<StoreRow>, DbError> {
    let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE user_id = $1 AND origin = $2");
    let row = sqlx::query_as::<_, StoreRow>(&sql)
        .bind(user_id)
        .bind(origin)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Removes a store together with its persisted catalog and history.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no such store.
pub async fn remove_store(pool: &PgPool, user_id: i64, origin: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM stores WHERE user_id = $1 AND origin = $2")
        .bind(user_id)
        .bind(origin)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
