//! Stateless signed session cookies.
//!
//! A session cookie is `shopcat_session=<payload>.<signature>` where
//! `payload` is the URL-safe base64 of `{user_id}:{email}` and `signature` is
//! the URL-safe base64 HMAC-SHA256 of the payload under the server secret.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SESSION_COOKIE: &str = "shopcat_session";

/// Cookie lifetime advertised to browsers.
const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

type HmacSha256 = Hmac<Sha256>;

/// The signed-in user carried by a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(SessionUser),
}

impl Caller {
    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Caller::Anonymous => None,
            Caller::User(user) => Some(user),
        }
    }

    /// Key used to scope per-caller state: the email, or `"anon"`.
    #[must_use]
    pub fn scope_key(&self) -> String {
        self.user()
            .map_or_else(|| "anon".to_owned(), |u| u.email.clone())
    }
}

/// Server secret used to sign sessions.
#[derive(Clone)]
pub struct SessionKey {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([redacted])")
    }
}

impl SessionKey {
    /// # Errors
    ///
    /// Returns [`hmac::digest::InvalidLength`] if the secret is rejected as a key.
    pub fn new(secret: &str) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    /// Produces the cookie value for `user`.
    #[must_use]
    pub fn sign(&self, user: &SessionUser) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!("{}:{}", user.id, user.email));
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Returns the user for a correctly signed cookie value, `None` otherwise.
    #[must_use]
    pub fn verify(&self, value: &str) -> Option<SessionUser> {
        let (payload, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        let (id, email) = decoded.split_once(':')?;
        Some(SessionUser {
            id: id.parse().ok()?,
            email: email.to_owned(),
        })
    }

    /// Resolves the caller from the request's `Cookie` headers. Missing or
    /// invalid sessions resolve to [`Caller::Anonymous`].
    #[must_use]
    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Caller {
        session_cookie(headers)
            .and_then(|value| self.verify(value))
            .map_or(Caller::Anonymous, Caller::User)
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value establishing a session.
///
/// # Errors
///
/// Returns an error if the signed value is not a valid header value.
pub fn session_set_cookie(
    cookie_value: &str,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={cookie_value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_MAX_AGE_SECS}{secure}"
    ))
}

/// `Set-Cookie` value clearing the session.
#[must_use]
pub fn session_clear_cookie() -> HeaderValue {
    HeaderValue::from_static("shopcat_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
