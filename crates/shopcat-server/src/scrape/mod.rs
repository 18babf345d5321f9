//! Server-side scrape orchestration.
//!
//! Streaming requests go through [`ScrapeService::stream`], which either
//! answers from the caller's persisted catalog or attaches to a live scrape
//! (starting one if none is running for the same caller and store). The
//! non-streaming endpoint uses [`ScrapeService::scrape_once`], memoised by
//! [`ScrapeCache`].

mod cache;
mod inflight;

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use shopcat_core::{Catalog, ScrapeEvent};
use shopcat_scraper::{CancellationToken, ScrapeOptions, ScraperError, ShopifyClient};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::catalog_store::CatalogStore;
use crate::session::{Caller, SessionUser};

pub use cache::ScrapeCache;
pub use inflight::{InFlight, ScrapeKey, SharedEvent};
use inflight::{Flight, Join};

pub type EventStream = BoxStream<'static, SharedEvent>;

pub struct ScrapeService {
    client: ShopifyClient,
    store: Arc<dyn CatalogStore>,
    inflight: InFlight,
    cache: ScrapeCache,
}

impl ScrapeService {
    #[must_use]
    pub fn new(client: ShopifyClient, store: Arc<dyn CatalogStore>, cache: ScrapeCache) -> Self {
        Self {
            client,
            store,
            inflight: InFlight::default(),
            cache,
        }
    }

    /// Number of scrapes currently running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inflight.len()
    }

    /// Event stream for one scrape request. The stream always ends with
    /// exactly one terminal event.
    pub async fn stream(self: &Arc<Self>, caller: &Caller, origin: String, force: bool) -> EventStream {
        if let (Some(user), false) = (caller.user(), force) {
            if let Some(catalog) = self.stored_catalog(user, &origin).await {
                tracing::info!(
                    origin = %origin,
                    products = catalog.products.len(),
                    "serving persisted catalog"
                );
                let events = vec![
                    Arc::new(ScrapeEvent::progress(format!(
                        "Loaded saved catalog for {origin}"
                    ))),
                    Arc::new(ScrapeEvent::finished(catalog)),
                ];
                return stream::iter(events).boxed();
            }
        }

        let key = ScrapeKey::new(caller, &origin);
        let rx = match self.inflight.join_or_start(&key) {
            Join::Joined(rx) => {
                tracing::info!(origin = %origin, scope = %key.scope, "joining running scrape");
                rx
            }
            Join::Started(flight, rx) => {
                let service = Arc::clone(self);
                tokio::spawn(service.drive(key, caller.user().cloned(), origin, flight));
                rx
            }
        };
        live_events(rx).boxed()
    }

    /// Runs one live scrape and broadcasts its events.
    async fn drive(
        self: Arc<Self>,
        key: ScrapeKey,
        user: Option<SessionUser>,
        origin: String,
        flight: Arc<Flight>,
    ) {
        let options = scrape_options(user.is_some(), flight.cancel.clone());
        let on_progress = |message: String| {
            if flight.tx.send(Arc::new(ScrapeEvent::progress(message))).is_err() {
                tracing::info!(origin = %key.origin, "no subscribers left, cancelling scrape");
                flight.cancel.cancel();
            }
        };

        let outcome = self.client.scrape_store(&origin, &on_progress, &options).await;

        let terminal = match outcome {
            Ok(_) if flight.cancel.is_cancelled() => {
                tracing::info!(origin = %origin, "scrape abandoned, skipping persistence");
                ScrapeEvent::error(format!("scrape of {origin} was cancelled"))
            }
            Ok(catalog) => {
                if let Some(user) = &user {
                    self.persist(user, &origin, &catalog).await;
                }
                self.cache.invalidate(&key).await;
                ScrapeEvent::finished(catalog)
            }
            Err(err) => {
                log_failure(&origin, &err);
                ScrapeEvent::error(err.to_string())
            }
        };

        self.inflight.finish(&key, &flight);
        // Nobody listening is fine; the scrape is done either way.
        let _ = flight.tx.send(Arc::new(terminal));
    }

    /// Non-streaming scrape. Results are memoised per (caller, origin);
    /// `force` drops the memoised entry and skips the persisted catalog.
    ///
    /// # Errors
    ///
    /// Returns the upstream failure; concurrent callers share it.
    pub async fn scrape_once(
        &self,
        caller: &Caller,
        origin: &str,
        force: bool,
    ) -> Result<Arc<Catalog>, Arc<ScraperError>> {
        let key = ScrapeKey::new(caller, origin);
        if force {
            self.cache.invalidate(&key).await;
        }

        let user = caller.user();
        self.cache
            .get_or_scrape(key, async move {
                if let (Some(user), false) = (user, force) {
                    if let Some(catalog) = self.stored_catalog(user, origin).await {
                        return Ok(Arc::new(catalog));
                    }
                }

                let options = scrape_options(user.is_some(), CancellationToken::new());
                let catalog = self
                    .client
                    .scrape_store(origin, &|_: String| {}, &options)
                    .await
                    .inspect_err(|err| log_failure(origin, err))?;

                if let Some(user) = user {
                    self.persist(user, origin, &catalog).await;
                }
                Ok(Arc::new(catalog))
            })
            .await
    }

    async fn stored_catalog(&self, user: &SessionUser, origin: &str) -> Option<Catalog> {
        match self.store.load(user.id, origin).await {
            Ok(stored) => stored.map(Catalog::from),
            Err(e) => {
                tracing::warn!(origin, user_id = user.id, error = %e, "failed to load persisted catalog");
                None
            }
        }
    }

    /// Persistence failures are logged; the scrape result is still returned.
    async fn persist(&self, user: &SessionUser, origin: &str, catalog: &Catalog) {
        match self.store.save(user.id, origin, &catalog.to_stored()).await {
            Ok(()) => tracing::info!(
                origin,
                user_id = user.id,
                products = catalog.products.len(),
                "persisted catalog"
            ),
            Err(e) => tracing::error!(
                origin,
                user_id = user.id,
                error = %e,
                "failed to persist catalog"
            ),
        }
    }
}

fn scrape_options(authenticated: bool, cancel: CancellationToken) -> ScrapeOptions {
    if authenticated {
        ScrapeOptions::authenticated(cancel)
    } else {
        ScrapeOptions::anonymous(cancel)
    }
}

fn log_failure(origin: &str, err: &ScraperError) {
    if err.is_cancelled() {
        tracing::info!(origin, "scrape cancelled");
    } else {
        tracing::warn!(origin, error = %err, "scrape failed");
    }
}

/// Adapts a subscription into a stream that ends after the terminal event.
/// A channel that closes without one yields a synthetic error event.
fn live_events(rx: broadcast::Receiver<SharedEvent>) -> impl futures::Stream<Item = SharedEvent> {
    stream::unfold(Some(rx), |state| async move {
        let Some(mut rx) = state else {
            return None;
        };
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let next = if event.is_terminal() { None } else { Some(rx) };
                    return Some((event, next));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "scrape subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    let event = Arc::new(ScrapeEvent::error("scrape ended unexpectedly"));
                    return Some((event, None));
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "../scrape_test.rs"]
mod tests;
