use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("request for page {page} of {url} failed: {source}")]
    Http {
        url: String,
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} on page {page} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        page: u32,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} for page {page} of {url}")]
    UnexpectedStatus { status: u16, url: String, page: u32 },

    #[error("pagination limit reached for {origin}: exceeded {max_pages} pages")]
    PaginationLimit { origin: String, max_pages: u32 },

    #[error("invalid shop URL \"{shop_url}\": {reason}")]
    InvalidShopUrl { shop_url: String, reason: String },

    #[error("scrape of {resource} from {origin} was cancelled before page {page}")]
    Cancelled {
        origin: String,
        resource: &'static str,
        page: u32,
    },
}

impl ScraperError {
    /// `true` when the error came from a cancellation rather than the upstream store.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
