use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcat_db::{ProductListItemRow, ProductListRow};
use uuid::Uuid;

use super::export::{csv_response, list_csv};
use super::{map_db_error, parse_origin, ApiError, ApiResponse, AppState, CurrentUser};
use crate::middleware::RequestId;
use crate::session::SessionUser;

const MAX_LIST_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub(super) struct CreateListRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddItemRequest {
    shop_url: String,
    product_id: i64,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RemoveItemQuery {
    #[serde(default)]
    shop_url: String,
    product_id: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct ListView {
    id: Uuid,
    name: String,
    item_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductListRow> for ListView {
    fn from(row: ProductListRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            item_count: row.item_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ListItemView {
    store_origin: String,
    product_id: i64,
    handle: String,
    title: String,
    added_at: DateTime<Utc>,
}

impl From<ProductListItemRow> for ListItemView {
    fn from(row: ProductListItemRow) -> Self {
        Self {
            store_origin: row.store_origin,
            product_id: row.product_id,
            handle: row.handle,
            title: row.title,
            added_at: row.added_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ListDetail {
    #[serde(flatten)]
    list: ListView,
    items: Vec<ListItemView>,
}

fn validate_name(req_id: &RequestId, name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_LIST_NAME_LEN {
        return Err(ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("list name must be 1 to {MAX_LIST_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_owned())
}

/// Loads a list owned by `user`; other users' lists read as not found.
async fn owned_list(
    state: &AppState,
    req_id: &RequestId,
    user: &SessionUser,
    list_id: Uuid,
) -> Result<ProductListRow, ApiError> {
    shopcat_db::get_list(&state.pool, user.id, list_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "list not found"))
}

async fn items_of(
    state: &AppState,
    req_id: &RequestId,
    list: &ProductListRow,
) -> Result<Vec<ProductListItemRow>, ApiError> {
    shopcat_db::list_items(&state.pool, list.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))
}

pub(super) async fn list_lists(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ListView>>>, ApiError> {
    let rows = shopcat_db::list_lists(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = rows.into_iter().map(ListView::from).collect();
    Ok(Json(ApiResponse::new(data, req_id)))
}

pub(super) async fn create_list(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateListRequest>,
) -> Result<Response, ApiError> {
    let name = validate_name(&req_id, &body.name)?;
    let row = shopcat_db::create_list(&state.pool, user.id, &name)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ListView::from(row), req_id)),
    )
        .into_response())
}

pub(super) async fn get_list(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ListDetail>>, ApiError> {
    let list = owned_list(&state, &req_id, &user, list_id).await?;
    let items = items_of(&state, &req_id, &list).await?;
    let detail = ListDetail {
        list: ListView::from(list),
        items: items.into_iter().map(ListItemView::from).collect(),
    };
    Ok(Json(ApiResponse::new(detail, req_id)))
}

pub(super) async fn delete_list(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    shopcat_db::delete_list(&state.pool, user.id, list_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Adding a product that is already on the list refreshes its handle and
/// title instead of duplicating it.
pub(super) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<Uuid>,
    Json(body): Json<AddItemRequest>,
) -> Result<Response, ApiError> {
    let origin = parse_origin(&req_id.0, &body.shop_url)?;
    let list = owned_list(&state, &req_id, &user, list_id).await?;
    let row = shopcat_db::add_list_item(
        &state.pool,
        list.id,
        &origin,
        body.product_id,
        body.handle.trim(),
        body.title.trim(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ListItemView::from(row), req_id)),
    )
        .into_response())
}

pub(super) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<Uuid>,
    Query(query): Query<RemoveItemQuery>,
) -> Result<StatusCode, ApiError> {
    let origin = parse_origin(&req_id.0, &query.shop_url)?;
    let list = owned_list(&state, &req_id, &user, list_id).await?;
    shopcat_db::remove_list_item(&state.pool, list.id, &origin, query.product_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn export_list(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let list = owned_list(&state, &req_id, &user, list_id).await?;
    let items = items_of(&state, &req_id, &list).await?;
    let filename = format!("list-{}.csv", list.public_id);
    Ok(csv_response(&filename, list_csv(&items)))
}
