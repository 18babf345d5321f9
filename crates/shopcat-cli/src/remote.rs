//! HTTP client for the shopcat server.
//!
//! The session is the raw `shopcat_session` cookie value; it is sent on
//! every request when present, and requests without it run anonymously.

use futures::StreamExt;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Deserialize;
use serde_json::json;
use shopcat_core::{Catalog, EventDecoder, ScrapeEvent};

const SESSION_COOKIE: &str = "shopcat_session";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Me {
    user: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    email: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<String>,
}

impl ServerClient {
    pub(crate) fn new(base_url: &str, session: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shopcat-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            session: session.filter(|s| !s.trim().is_empty()),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.session {
            Some(session) => builder.header(COOKIE, format!("{SESSION_COOKIE}={session}")),
            None => builder,
        }
    }

    /// Email of the signed-in user, or `None` when running anonymously.
    pub(crate) async fn current_user(&self) -> anyhow::Result<Option<String>> {
        if self.session.is_none() {
            return Ok(None);
        }
        let response = self.request(reqwest::Method::GET, "/api/v1/auth/me").send().await?;
        let response = ensure_success(response).await?;
        let me: Envelope<Me> = response.json().await?;
        if me.data.user.is_none() {
            tracing::warn!("session was not accepted by the server; continuing anonymously");
        }
        Ok(me.data.user.map(|u| u.email))
    }

    /// Signs in and returns the new session cookie value.
    pub(crate) async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(session_from_set_cookie)
            .ok_or_else(|| anyhow::anyhow!("server did not return a session cookie"))
    }

    /// Runs a streaming scrape, calling `on_progress` for every progress
    /// message, and returns the catalog from the terminal event.
    pub(crate) async fn stream_scrape(
        &self,
        shop_url: &str,
        force: bool,
        mut on_progress: impl FnMut(&str),
    ) -> anyhow::Result<Catalog> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/scrape/stream")
            .json(&json!({ "shopUrl": shop_url, "force": force }))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = EventDecoder::new();
        while let Some(chunk) = body.next().await {
            for event in decoder.push(&chunk?) {
                match event? {
                    ScrapeEvent::Progress(message) => on_progress(&message),
                    ScrapeEvent::Error(message) => anyhow::bail!("scrape failed: {message}"),
                    ScrapeEvent::Finished(catalog) => return Ok(*catalog),
                }
            }
        }
        decoder.finish()?;
        anyhow::bail!("scrape stream ended without a result")
    }
}

/// Turns a non-2xx response into an error carrying the server's message.
async fn ensure_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(body) => anyhow::bail!(
            "server returned {status} ({}): {}",
            body.error.code,
            body.error.message
        ),
        Err(_) => anyhow::bail!("server returned {status}: {text}"),
    }
}

fn session_from_set_cookie(header: &str) -> Option<String> {
    let (name, value) = header.split(';').next()?.trim().split_once('=')?;
    (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_owned())
}
