use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::session::{Caller, SessionKey};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter guarding the scrape endpoints, which fan out to
/// third-party storefronts.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

fn middleware_error(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolves the session cookie into a [`Caller`] request extension.
/// Requests without a valid session proceed as [`Caller::Anonymous`].
pub async fn resolve_caller(
    State(sessions): State<SessionKey>,
    mut req: Request,
    next: Next,
) -> Response {
    let caller = sessions.caller_from_headers(req.headers());
    req.extensions_mut().insert(caller);
    next.run(req).await
}

/// Rejects anonymous callers with `401`.
pub async fn require_user(req: Request, next: Next) -> Response {
    match req.extensions().get::<Caller>() {
        Some(Caller::User(_)) => next.run(req).await,
        _ => middleware_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "sign in to use this endpoint",
        ),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return middleware_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::ServiceExt;

    use crate::session::SessionUser;

    fn app(sessions: SessionKey, rate_limit: RateLimitState) -> Router {
        Router::new()
            .route(
                "/me",
                get(|Extension(caller): Extension<Caller>| async move { caller.scope_key() }),
            )
            .route(
                "/private",
                get(|| async { "ok" }).layer(axum::middleware::from_fn(require_user)),
            )
            .layer(axum::middleware::from_fn_with_state(
                rate_limit,
                enforce_rate_limit,
            ))
            .layer(axum::middleware::from_fn_with_state(sessions, resolve_caller))
            .layer(axum::middleware::from_fn(request_id))
    }

    fn sessions() -> SessionKey {
        SessionKey::new("test-secret").expect("key")
    }

    #[tokio::test]
    async fn anonymous_caller_is_rejected_by_require_user() {
        let response = app(sessions(), RateLimitState::new(10, Duration::from_secs(60)))
            .oneshot(Request::builder().uri("/private").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn session_cookie_resolves_user() {
        let key = sessions();
        let cookie = key.sign(&SessionUser {
            id: 3,
            email: "ada@example.com".to_string(),
        });
        let response = app(key, RateLimitState::new(10, Duration::from_secs(60)))
            .oneshot(
                Request::builder()
                    .uri("/private")
                    .header("cookie", format!("shopcat_session={cookie}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let response = app(sessions(), RateLimitState::new(10, Duration::from_secs(60)))
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn rate_limit_rejects_requests_over_the_window() {
        let app = app(sessions(), RateLimitState::new(1, Duration::from_secs(60)));
        let first = app
            .clone()
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
