//! Page-number pagination loop for `ShopifyClient`.

use crate::error::ScraperError;
use crate::types::PagedResource;

use super::{FetchOptions, ShopifyClient, MAX_PAGES};

impl ShopifyClient {
    /// Fetches every page of `R` from `origin`, starting at page 1.
    ///
    /// Pages are requested strictly one after another. The loop stops when a
    /// page comes back empty or when `options.max_pages` pages have been
    /// requested. `on_progress` is called before each page request and once
    /// more when the loop completes, in request order.
    ///
    /// **All-or-nothing semantics**: on any page failure, already-fetched
    /// items from earlier pages are discarded and the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_page`]. Returns
    /// [`ScraperError::Cancelled`] if `options.cancel` fires, and
    /// [`ScraperError::PaginationLimit`] if an uncapped fetch exceeds
    /// [`MAX_PAGES`].
    pub async fn fetch_paged<R, F>(
        &self,
        origin: &str,
        on_progress: &F,
        options: &FetchOptions,
    ) -> Result<Vec<R::Item>, ScraperError>
    where
        R: PagedResource,
        F: Fn(String) + Sync + ?Sized,
    {
        let mut items: Vec<R::Item> = Vec::new();
        let mut page = 1u32;
        let mut requests = 0u32;

        loop {
            if options.max_pages.is_some_and(|max| page > max) {
                tracing::debug!(origin, resource = R::LABEL, page, "page cap reached");
                break;
            }
            if page > MAX_PAGES {
                return Err(ScraperError::PaginationLimit {
                    origin: origin.to_owned(),
                    max_pages: MAX_PAGES,
                });
            }
            if options.cancel.is_cancelled() {
                return Err(cancelled::<R>(origin, page));
            }

            on_progress(format!("Fetching {} page {page}...", R::LABEL));
            tracing::debug!(origin, resource = R::LABEL, page, "fetching page");
            requests += 1;

            let batch = tokio::select! {
                biased;
                () = options.cancel.cancelled() => return Err(cancelled::<R>(origin, page)),
                result = self.fetch_page::<R>(origin, page, options.page_size) => result?,
            };

            if batch.is_empty() {
                break;
            }
            items.extend(batch);
            page += 1;
        }

        tracing::info!(
            origin,
            resource = R::LABEL,
            count = items.len(),
            requests,
            "paginated fetch complete"
        );
        on_progress(format!(
            "Fetched {} {} in {requests} request(s)",
            items.len(),
            R::LABEL
        ));

        Ok(items)
    }
}

fn cancelled<R: PagedResource>(origin: &str, page: u32) -> ScraperError {
    ScraperError::Cancelled {
        origin: origin.to_owned(),
        resource: R::LABEL,
        page,
    }
}
