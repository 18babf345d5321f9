//! Database operations for `users`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `users` table.
///
/// `password_hash` is an Argon2 PHC string; hashing and verification live
/// in the server.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Inserts a new user. `email` is stored lower-cased.
///
/// # Errors
///
/// Returns [`DbError::Duplicate`] if the email is already registered, or
/// [`DbError::Sqlx`] on any other failure.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (public_id, email, password_hash) \
         VALUES ($1, $2, $3) \
         RETURNING id, public_id, email, password_hash, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(email.trim().to_lowercase())
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::from_insert(e, "user"))
}

/// Case-insensitive lookup by email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, public_id, email, password_hash, created_at \
         FROM users WHERE email = $1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, public_id, email, password_hash, created_at \
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
