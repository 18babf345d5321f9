//! `fetch`: scrape a storefront directly from this machine.

use std::fmt::Write as _;
use std::io::Write as _;

use shopcat_core::Catalog;
use shopcat_scraper::{CancellationToken, ScrapeOptions, ShopifyClient};

const USER_AGENT: &str = "shopcat/0.1 (catalog-import)";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Scrapes `shop_url` without going through the server. Ctrl-C cancels
/// before the next page request.
///
/// # Errors
///
/// Returns the scraper error, including cancellation.
pub(crate) async fn run_fetch(shop_url: &str, max_pages: Option<u32>) -> anyhow::Result<Catalog> {
    let client = ShopifyClient::new(REQUEST_TIMEOUT_SECS, USER_AGENT)
        .map_err(|e| anyhow::anyhow!("failed to build storefront client: {e}"))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling scrape");
            on_ctrl_c.cancel();
        }
    });

    let options = ScrapeOptions {
        max_product_pages: max_pages,
        ..ScrapeOptions::authenticated(cancel)
    };
    let result = client
        .scrape_store(shop_url, &|message: String| eprintln!("{message}"), &options)
        .await;
    watcher.abort();

    Ok(result?)
}

pub(crate) fn render_catalog(catalog: &Catalog) -> String {
    let mut out = format!(
        "{} products, {} collections, {} vendors, {} product types",
        catalog.products.len(),
        catalog.collections.len(),
        catalog.vendors.len(),
        catalog.product_types.len()
    );
    for vendor in &catalog.vendors {
        let name = if vendor.name.is_empty() {
            "(no vendor)"
        } else {
            vendor.name.as_str()
        };
        let _ = write!(out, "\n  {name}: {}", vendor.count);
    }
    out
}

pub(crate) fn write_json(catalog: &Catalog) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, catalog)?;
    writeln!(handle)?;
    Ok(())
}
