//! Saved product lists: `product_lists` and `product_list_items`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `product_lists`, with its item count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductListRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from `product_list_items`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductListItemRow {
    pub id: i64,
    pub list_id: i64,
    pub store_origin: String,
    pub product_id: i64,
    pub handle: String,
    pub title: String,
    pub added_at: DateTime<Utc>,
}

const LIST_SELECT: &str = "SELECT l.id, l.public_id, l.user_id, l.name, \
                                  (SELECT COUNT(*) FROM product_list_items i \
                                   WHERE i.list_id = l.id) AS item_count, \
                                  l.created_at, l.updated_at \
                           FROM product_lists l";

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_list(pool: &PgPool, user_id: i64, name: &str) -> Result<ProductListRow, DbError> {
    let row = sqlx::query_as::<_, ProductListRow>(
        "INSERT INTO product_lists (public_id, user_id, name) VALUES ($1, $2, $3) \
         RETURNING id, public_id, user_id, name, 0::BIGINT AS item_count, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_lists(pool: &PgPool, user_id: i64) -> Result<Vec<ProductListRow>, DbError> {
    let sql = format!("{LIST_SELECT} WHERE l.user_id = $1 ORDER BY l.updated_at DESC, l.id DESC");
    let rows = sqlx::query_as::<_, ProductListRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches one of the user's lists by its public id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_list(
    pool: &PgPool,
    user_id: i64,
    public_id: Uuid,
) -> Result<Option<ProductListRow>, DbError> {
    let sql = format!("{LIST_SELECT} WHERE l.user_id = $1 AND l.public_id = $2");
    let row = sqlx::query_as::<_, ProductListRow>(&sql)
        .bind(user_id)
        .bind(public_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the user has no such list.
pub async fn delete_list(pool: &PgPool, user_id: i64, public_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM product_lists WHERE user_id = $1 AND public_id = $2")
        .bind(user_id)
        .bind(public_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Items of a list, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items(pool: &PgPool, list_id: i64) -> Result<Vec<ProductListItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductListItemRow>(
        "SELECT id, list_id, store_origin, product_id, handle, title, added_at \
         FROM product_list_items WHERE list_id = $1 ORDER BY added_at, id",
    )
    .bind(list_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Adds a product to a list. Re-adding the same (origin, product) refreshes
/// its handle and title.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn add_list_item(
    pool: &PgPool,
    list_id: i64,
    store_origin: &str,
    product_id: i64,
    handle: &str,
    title: &str,
) -> Result<ProductListItemRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ProductListItemRow>(
        "INSERT INTO product_list_items (list_id, store_origin, product_id, handle, title) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (list_id, store_origin, product_id) DO UPDATE \
         SET handle = EXCLUDED.handle, title = EXCLUDED.title \
         RETURNING id, list_id, store_origin, product_id, handle, title, added_at",
    )
    .bind(list_id)
    .bind(store_origin)
    .bind(product_id)
    .bind(handle)
    .bind(title)
    .fetch_one(&mut *tx)
    .await?;

    touch_list(&mut tx, list_id).await?;
    tx.commit().await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the item is not on the list.
pub async fn remove_list_item(
    pool: &PgPool,
    list_id: i64,
    store_origin: &str,
    product_id: i64,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "DELETE FROM product_list_items \
         WHERE list_id = $1 AND store_origin = $2 AND product_id = $3",
    )
    .bind(list_id)
    .bind(store_origin)
    .bind(product_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    touch_list(&mut tx, list_id).await?;
    tx.commit().await?;
    Ok(())
}

async fn touch_list(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    list_id: i64,
) -> Result<(), DbError> {
    sqlx::query("UPDATE product_lists SET updated_at = NOW() WHERE id = $1")
        .bind(list_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
