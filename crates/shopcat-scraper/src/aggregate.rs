//! Catalog aggregation: products and collections for one storefront.

use shopcat_core::{Catalog, Collection};
use tokio_util::sync::CancellationToken;

use crate::client::{extract_store_origin, FetchOptions, ShopifyClient, PAGE_SIZE};
use crate::error::ScraperError;
use crate::types::{CollectionsPage, ProductsPage};

/// Caps applied to anonymous callers: first product page, first 250 collections.
pub const ANONYMOUS_MAX_PRODUCT_PAGES: u32 = 1;
pub const ANONYMOUS_MAX_COLLECTIONS: usize = 250;

/// Options for [`ShopifyClient::scrape_store`].
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub max_product_pages: Option<u32>,
    pub max_collections: Option<usize>,
    pub cancel: CancellationToken,
}

impl ScrapeOptions {
    /// Scrape for signed-in callers: every product page.
    ///
    /// Collections always come from the first `collections.json` page, so
    /// even here at most [`PAGE_SIZE`] collections are returned although
    /// `max_collections` is `None`.
    #[must_use]
    pub fn authenticated(cancel: CancellationToken) -> Self {
        Self {
            max_product_pages: None,
            max_collections: None,
            cancel,
        }
    }

    /// Cost-bounded scrape for anonymous callers.
    #[must_use]
    pub fn anonymous(cancel: CancellationToken) -> Self {
        Self {
            max_product_pages: Some(ANONYMOUS_MAX_PRODUCT_PAGES),
            max_collections: Some(ANONYMOUS_MAX_COLLECTIONS),
            cancel,
        }
    }
}

impl ShopifyClient {
    /// Scrapes the full catalog of the store at `shop_url`.
    ///
    /// Products and collections are fetched concurrently; if either fails the
    /// whole scrape fails and nothing is returned. Collections without a
    /// handle are dropped before the `max_collections` cap is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidShopUrl`] for an unusable `shop_url`,
    /// otherwise the first error from either paginated fetch.
    pub async fn scrape_store<F>(
        &self,
        shop_url: &str,
        on_progress: &F,
        options: &ScrapeOptions,
    ) -> Result<Catalog, ScraperError>
    where
        F: Fn(String) + Sync + ?Sized,
    {
        let origin = extract_store_origin(shop_url)?;
        tracing::info!(
            origin = %origin,
            max_product_pages = ?options.max_product_pages,
            max_collections = ?options.max_collections,
            "starting store scrape"
        );
        on_progress(format!("Scraping {origin}"));

        let product_options = FetchOptions {
            page_size: PAGE_SIZE,
            max_pages: options.max_product_pages,
            cancel: options.cancel.clone(),
        };
        // Collections are single-page; see `ScrapeOptions::authenticated`.
        let collection_options = FetchOptions {
            page_size: PAGE_SIZE,
            max_pages: Some(1),
            cancel: options.cancel.clone(),
        };

        let (products, collections) = tokio::try_join!(
            self.fetch_paged::<ProductsPage, F>(&origin, on_progress, &product_options),
            self.fetch_paged::<CollectionsPage, F>(&origin, on_progress, &collection_options),
        )?;

        let collections = usable_collections(collections, options.max_collections);
        let catalog = Catalog::from_parts(products, collections);

        tracing::info!(
            origin = %origin,
            products = catalog.products.len(),
            collections = catalog.collections.len(),
            vendors = catalog.vendors.len(),
            "store scrape complete"
        );
        on_progress(format!(
            "Found {} products and {} collections",
            catalog.products.len(),
            catalog.collections.len()
        ));

        Ok(catalog)
    }
}

/// Drops collections without a handle, then applies the cap.
#[must_use]
pub fn usable_collections(collections: Vec<Collection>, cap: Option<usize>) -> Vec<Collection> {
    let usable = collections.into_iter().filter(Collection::is_usable);
    match cap {
        Some(cap) => usable.take(cap).collect(),
        None => usable.collect(),
    }
}
