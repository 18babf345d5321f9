pub mod aggregate;
pub mod client;
pub mod error;
pub mod types;

pub use aggregate::ScrapeOptions;
pub use client::{extract_store_origin, FetchOptions, ShopifyClient, MAX_PAGES, PAGE_SIZE};
pub use error::ScraperError;
pub use tokio_util::sync::CancellationToken;
pub use types::{CollectionsPage, PagedResource, ProductsPage};
