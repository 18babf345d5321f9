use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcat_core::Catalog;
use shopcat_db::{ScrapeHistoryRow, StoreRow};

use super::export::{catalog_csv, csv_response, filename_stem};
use super::{map_db_error, normalize_limit, parse_origin, ApiError, ApiResponse, AppState, CurrentUser};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StoreQuery {
    #[serde(default)]
    shop_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryQuery {
    #[serde(default)]
    shop_url: String,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct StoreItem {
    origin: String,
    product_count: i32,
    collection_count: i32,
    last_scraped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<StoreRow> for StoreItem {
    fn from(row: StoreRow) -> Self {
        Self {
            origin: row.origin,
            product_count: row.product_count,
            collection_count: row.collection_count,
            last_scraped_at: row.last_scraped_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StoredCatalogView {
    origin: String,
    scraped_at: DateTime<Utc>,
    catalog: Catalog,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryItem {
    product_count: i32,
    collection_count: i32,
    scraped_at: DateTime<Utc>,
}

impl From<ScrapeHistoryRow> for HistoryItem {
    fn from(row: ScrapeHistoryRow) -> Self {
        Self {
            product_count: row.product_count,
            collection_count: row.collection_count,
            scraped_at: row.scraped_at,
        }
    }
}

pub(super) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<StoreItem>>>, ApiError> {
    let rows = shopcat_db::list_stores(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = rows.into_iter().map(StoreItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id)))
}

pub(super) async fn add_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<StoreQuery>,
) -> Result<Response, ApiError> {
    let origin = parse_origin(&req_id.0, &body.shop_url)?;
    let row = shopcat_db::add_store(&state.pool, user.id, &origin)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    tracing::info!(user_id = user.id, origin = %row.origin, "store saved");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StoreItem::from(row), req_id)),
    )
        .into_response())
}

/// Removing a store also drops its persisted catalog and history.
pub(super) async fn remove_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StoreQuery>,
) -> Result<StatusCode, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    shopcat_db::remove_store(&state.pool, user.id, &origin)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    tracing::info!(user_id = user.id, origin = %origin, "store removed");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn get_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StoreQuery>,
) -> Result<Json<ApiResponse<StoredCatalogView>>, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    let row = shopcat_db::get_catalog(&state.pool, user.id, &origin)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no saved catalog for {origin}"),
            )
        })?;

    let view = StoredCatalogView {
        origin,
        scraped_at: row.scraped_at,
        catalog: Catalog::from(row.catalog.0),
    };
    Ok(Json(ApiResponse::new(view, req_id)))
}

/// Drops the persisted catalog so the next scrape goes upstream. The store
/// itself stays saved.
pub(super) async fn clear_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StoreQuery>,
) -> Result<StatusCode, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    let cleared = shopcat_db::clear_catalog(&state.pool, user.id, &origin)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if cleared {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no saved catalog for {origin}"),
        ))
    }
}

pub(super) async fn list_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryItem>>>, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    let rows = shopcat_db::list_scrape_history(
        &state.pool,
        user.id,
        &origin,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = rows.into_iter().map(HistoryItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id)))
}

pub(super) async fn export_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StoreQuery>,
) -> Result<Response, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    let row = shopcat_db::get_catalog(&state.pool, user.id, &origin)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no saved catalog for {origin}"),
            )
        })?;

    let filename = format!("{}-catalog.csv", filename_stem(&origin));
    Ok(csv_response(&filename, catalog_csv(&row.catalog.0)))
}
