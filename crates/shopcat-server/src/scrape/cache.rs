//! TTL cache in front of the non-streaming scrape endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use shopcat_core::Catalog;
use shopcat_scraper::ScraperError;

use super::inflight::ScrapeKey;

/// Memoised catalogs keyed by (caller, origin).
///
/// Concurrent misses for one key run a single scrape; the others wait for it.
#[derive(Clone)]
pub struct ScrapeCache {
    inner: Cache<ScrapeKey, Arc<Catalog>>,
}

impl ScrapeCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Returns the cached catalog for `key`, running `scrape` on a miss.
    /// Failed scrapes are not cached.
    ///
    /// # Errors
    ///
    /// Returns the scrape's error, shared between coalesced callers.
    pub async fn get_or_scrape<F>(
        &self,
        key: ScrapeKey,
        scrape: F,
    ) -> Result<Arc<Catalog>, Arc<ScraperError>>
    where
        F: Future<Output = Result<Arc<Catalog>, ScraperError>>,
    {
        self.inner.try_get_with(key, scrape).await
    }

    pub async fn invalidate(&self, key: &ScrapeKey) {
        self.inner.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Caller;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key() -> ScrapeKey {
        ScrapeKey::new(&Caller::Anonymous, "https://a.example")
    }

    fn empty() -> Arc<Catalog> {
        Arc::new(Catalog::from_parts(Vec::new(), Vec::new()))
    }

    #[tokio::test]
    async fn concurrent_misses_are_coalesced() {
        let cache = ScrapeCache::new(Duration::from_secs(60), 16);
        let runs = Arc::new(AtomicUsize::new(0));

        let scrape = || {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(empty())
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_scrape(key(), scrape()),
            cache.get_or_scrape(key(), scrape()),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_scrape() {
        let cache = ScrapeCache::new(Duration::from_secs(60), 16);
        let runs = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_scrape(key(), async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(empty())
                })
                .await
                .unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        cache.invalidate(&key()).await;
        cache
            .get_or_scrape(key(), async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(empty())
            })
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ScrapeCache::new(Duration::from_secs(60), 16);
        let err = cache
            .get_or_scrape(key(), async {
                Err(ScraperError::NotFound {
                    url: "https://a.example/products.json".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(*err, ScraperError::NotFound { .. }));

        assert!(cache.get_or_scrape(key(), async { Ok(empty()) }).await.is_ok());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ScrapeCache::new(Duration::from_millis(50), 16);
        let runs = AtomicUsize::new(0);
        let run = || async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(empty())
        };

        cache.get_or_scrape(key(), run()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.get_or_scrape(key(), run()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
