//! `scrape`: stream a scrape from the server into the local snapshot cache.

use shopcat_cache::{cache_key, Reconciliation, SnapshotCache};

use crate::remote::ServerClient;

/// What one `scrape` run did to the local cache.
#[derive(Debug)]
pub(crate) struct ScrapeSummary {
    pub origin: String,
    pub user: String,
    pub collections: usize,
    pub reconciliation: Reconciliation,
}

/// Streams a scrape of `shop_url` and merges the result into the snapshot of
/// the caller the server recognises (or the anonymous snapshot).
///
/// # Errors
///
/// Returns an error for an unusable shop URL, a server or transport failure,
/// or a terminal error event. The local cache is untouched in that case.
pub(crate) async fn run_scrape(
    server: &ServerClient,
    cache: &SnapshotCache,
    shop_url: &str,
    force: bool,
    on_progress: impl FnMut(&str),
) -> anyhow::Result<ScrapeSummary> {
    let origin = shopcat_scraper::extract_store_origin(shop_url)?;
    let user = cache_key(server.current_user().await?.as_deref());

    let catalog = server.stream_scrape(&origin, force, on_progress).await?;
    let collections = catalog.collections.len();
    let (_, reconciliation) = cache.apply(&user, &origin, catalog);

    tracing::info!(
        origin = %origin,
        user = %user,
        products = reconciliation.products.len(),
        reused = reconciliation.reused,
        replaced = reconciliation.replaced,
        added = reconciliation.added,
        "merged scrape into local cache"
    );

    Ok(ScrapeSummary {
        origin,
        user,
        collections,
        reconciliation,
    })
}

pub(crate) fn render_summary(summary: &ScrapeSummary) -> String {
    let r = &summary.reconciliation;
    format!(
        "{}: {} products ({} unchanged, {} updated, {} new), {} collections cached for {}",
        summary.origin,
        r.products.len(),
        r.reused,
        r.replaced,
        r.added,
        summary.collections,
        summary.user
    )
}
