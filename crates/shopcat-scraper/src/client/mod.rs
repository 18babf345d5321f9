//! HTTP client for Shopify's public storefront JSON endpoints.

mod fetch_paged;
mod origin;

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::types::PagedResource;

pub use origin::extract_store_origin;
// Re-export for test visibility via `use super::*`
#[cfg(test)]
use origin::extract_domain;

/// Page size for paginated endpoints; the storefront platform's maximum.
pub const PAGE_SIZE: u32 = 250;

/// Maximum number of pages to fetch before returning an error.
/// Guards against storefronts that never return an empty page.
pub const MAX_PAGES: u32 = 200;

/// Per-call options for [`ShopifyClient::fetch_paged`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub page_size: u32,
    /// Stop after this many pages even if more data exists.
    pub max_pages: Option<u32>,
    /// Checked before every page request and raced against in-flight requests.
    pub cancel: CancellationToken,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_pages: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// HTTP client for a storefront's public `products.json` and
/// `collections.json` endpoints.
///
/// Non-2xx responses are mapped to typed errors carrying the page number and
/// URL. Nothing is retried: a failed page fails the whole fetch.
#[derive(Debug, Clone)]
pub struct ShopifyClient {
    client: Client,
}

impl ShopifyClient {
    /// Creates a `ShopifyClient` with configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches and decodes one page of `R` from `origin`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`]: HTTP 429.
    /// - [`ScraperError::NotFound`]: HTTP 404.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure.
    /// - [`ScraperError::Deserialize`]: response body does not match `R`.
    pub async fn fetch_page<R: PagedResource>(
        &self,
        origin: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<R::Item>, ScraperError> {
        let url = Self::page_url(origin, R::PATH, page, page_size)?;

        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::ACCEPT,
                "application/json,text/html;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::REFERER, origin)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|source| ScraperError::Http {
                url: url.clone(),
                page,
                source,
            })?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                domain: origin::extract_domain(origin),
                page,
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound { url });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
                page,
            });
        }

        let body = response.text().await.map_err(|source| ScraperError::Http {
            url: url.clone(),
            page,
            source,
        })?;
        let parsed = serde_json::from_str::<R>(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("{} page {page} from {url}", R::LABEL),
            source: e,
        })?;

        Ok(parsed.into_items())
    }

    /// Builds `{origin}/{path}?limit={page_size}&page={page}`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidShopUrl`] if `origin` cannot be parsed
    /// as a URL base.
    fn page_url(
        origin: &str,
        path: &str,
        page: u32,
        page_size: u32,
    ) -> Result<String, ScraperError> {
        let base = format!("{}/{path}", origin.trim_end_matches('/'));
        let mut url = reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidShopUrl {
            shop_url: origin.to_owned(),
            reason: format!("origin \"{origin}\" is not a valid URL base: {e}"),
        })?;

        url.query_pairs_mut()
            .append_pair("limit", &page_size.to_string())
            .append_pair("page", &page.to_string());

        Ok(url.to_string())
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
