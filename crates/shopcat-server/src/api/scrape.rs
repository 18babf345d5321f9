use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::StreamExt;
use serde::Deserialize;
use shopcat_core::Catalog;
use shopcat_scraper::ScraperError;

use super::{parse_origin, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;
use crate::session::Caller;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScrapeRequest {
    #[serde(default)]
    shop_url: String,
    #[serde(default)]
    force: bool,
}

/// Validates the body before any streaming starts, so bad input is a
/// plain JSON `400` rather than an error event.
fn parse_request(
    req_id: &RequestId,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<(String, bool), ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.body_text()))?;
    let origin = parse_origin(&req_id.0, &request.shop_url)?;
    Ok((origin, request.force))
}

/// `POST /api/v1/scrape/stream`: newline-delimited `data:` frames ending
/// with exactly one `finished` or `error` event.
pub(super) async fn scrape_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let (origin, force) = parse_request(&req_id, body)?;
    tracing::info!(
        origin = %origin,
        force,
        caller = %caller.scope_key(),
        request_id = %req_id.0,
        "scrape stream requested"
    );

    let events = state.scrapes.stream(&caller, origin, force).await;
    let frames = events.map(|event| Ok::<_, std::convert::Infallible>(event.encode()));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// `POST /api/v1/scrape`: the whole catalog in one JSON response.
pub(super) async fn scrape_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Arc<Catalog>>>, ApiError> {
    let (origin, force) = parse_request(&req_id, body)?;

    let catalog = state
        .scrapes
        .scrape_once(&caller, &origin, force)
        .await
        .map_err(|e| scrape_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(catalog, req_id)))
}

fn scrape_error(request_id: String, error: &ScraperError) -> ApiError {
    match error {
        ScraperError::NotFound { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        ScraperError::InvalidShopUrl { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        _ => ApiError::new(request_id, "upstream_error", error.to_string()),
    }
}
