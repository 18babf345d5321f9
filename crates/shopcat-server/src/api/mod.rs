mod auth;
mod export;
mod lists;
mod scrape;
mod stores;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_user, resolve_caller, RateLimitState, RequestId,
};
use crate::scrape::ScrapeService;
use crate::session::{Caller, SessionKey, SessionUser};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub scrapes: Arc<ScrapeService>,
    pub sessions: SessionKey,
    /// Adds `Secure` to session cookies; off in development.
    pub secure_cookies: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    running_scrapes: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, req_id: RequestId) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(req_id.0),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// The signed-in user, for handlers mounted behind [`require_user`].
pub(super) struct CurrentUser(pub SessionUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Caller>() {
            Some(Caller::User(user)) => Ok(Self(user.clone())),
            _ => {
                let req_id = parts
                    .extensions
                    .get::<RequestId>()
                    .map(|r| r.0.clone())
                    .unwrap_or_default();
                Err(ApiError::new(req_id, "unauthorized", "sign in to use this endpoint"))
            }
        }
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &shopcat_db::DbError) -> ApiError {
    match error {
        shopcat_db::DbError::NotFound => ApiError::new(request_id, "not_found", "not found"),
        shopcat_db::DbError::Duplicate { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Reduces a user-supplied shop URL to its origin, or a `validation_error`.
pub(super) fn parse_origin(request_id: &str, shop_url: &str) -> Result<String, ApiError> {
    if shop_url.trim().is_empty() {
        return Err(ApiError::new(
            request_id,
            "bad_request",
            "shopUrl is required",
        ));
    }
    shopcat_scraper::extract_store_origin(shop_url)
        .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn scrape_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/scrape", post(scrape::scrape_catalog))
        .route("/api/v1/scrape/stream", post(scrape::scrape_stream))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

fn account_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/stores",
            get(stores::list_stores)
                .post(stores::add_store)
                .delete(stores::remove_store),
        )
        .route(
            "/api/v1/stores/catalog",
            get(stores::get_catalog).delete(stores::clear_catalog),
        )
        .route("/api/v1/stores/history", get(stores::list_history))
        .route("/api/v1/stores/export", get(stores::export_catalog))
        .route(
            "/api/v1/lists",
            get(lists::list_lists).post(lists::create_list),
        )
        .route(
            "/api/v1/lists/{list_id}",
            get(lists::get_list).delete(lists::delete_list),
        )
        .route(
            "/api/v1/lists/{list_id}/items",
            post(lists::add_item).delete(lists::remove_item),
        )
        .route("/api/v1/lists/{list_id}/export", get(lists::export_list))
        .layer(axum::middleware::from_fn(require_user))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me));

    Router::new()
        .merge(public_routes)
        .merge(scrape_router(rate_limit))
        .merge(account_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(
                    state.sessions.clone(),
                    resolve_caller,
                )),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let running_scrapes = state.scrapes.running();

    match shopcat_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    running_scrapes,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        running_scrapes,
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "../api_test.rs"]
mod tests;
