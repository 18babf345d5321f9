use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{map_db_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::session::{session_clear_cookie, session_set_cookie, Caller, SessionUser};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub(super) struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AccountView {
    email: String,
}

#[derive(Debug, Serialize)]
pub(super) struct MeView {
    user: Option<AccountView>,
}

#[derive(Debug, Serialize)]
pub(super) struct SignedOut {
    signed_out: bool,
}

fn normalized_email(req_id: &RequestId, email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "a valid email address is required",
        ))
    }
}

fn signed_in(
    state: &AppState,
    req_id: RequestId,
    user: SessionUser,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let cookie = session_set_cookie(&state.sessions.sign(&user), state.secure_cookies).map_err(
        |e| {
            tracing::error!(error = %e, "failed to build session cookie");
            ApiError::new(req_id.0.clone(), "internal_error", "failed to start session")
        },
    )?;
    let body = ApiResponse::new(AccountView { email: user.email }, req_id);
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Credentials>,
) -> Result<Response, ApiError> {
    let email = normalized_email(&req_id, &body.email)?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    let password_hash = hash_password_blocking(body.password).await.map_err(|e| {
        tracing::error!(error = %e, "failed to hash password");
        ApiError::new(req_id.0.clone(), "internal_error", "failed to create account")
    })?;
    let user = shopcat_db::create_user(&state.pool, &email, &password_hash)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(user_id = user.id, "registered user");
    let session = SessionUser {
        id: user.id,
        email: user.email,
    };
    signed_in(&state, req_id, session, StatusCode::CREATED)
}

pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<Credentials>,
) -> Result<Response, ApiError> {
    let email = normalized_email(&req_id, &body.email)?;
    let user = shopcat_db::get_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let verified = match &user {
        Some(u) => verify_password_blocking(body.password, u.password_hash.clone())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to verify password");
                ApiError::new(req_id.0.clone(), "internal_error", "failed to sign in")
            })?,
        None => false,
    };
    let Some(user) = user.filter(|_| verified) else {
        return Err(ApiError::new(
            req_id.0,
            "unauthorized",
            "invalid email or password",
        ));
    };

    let session = SessionUser {
        id: user.id,
        email: user.email,
    };
    signed_in(&state, req_id, session, StatusCode::OK)
}

pub(super) async fn logout(Extension(req_id): Extension<RequestId>) -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_clear_cookie())],
        Json(ApiResponse::new(SignedOut { signed_out: true }, req_id)),
    )
        .into_response()
}

pub(super) async fn me(
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
) -> Json<ApiResponse<MeView>> {
    let user = caller.user().map(|u| AccountView {
        email: u.email.clone(),
    });
    Json(ApiResponse::new(MeView { user }, req_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req_id() -> RequestId {
        RequestId("test".to_string())
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(
            normalized_email(&req_id(), "  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["", "ada", "@example.com", "ada@localhost"] {
            let err = normalized_email(&req_id(), email).unwrap_err();
            assert_eq!(err.error.code, "validation_error", "{email}");
        }
    }
}
