//! `cache show` / `cache clear` for the local snapshot cache.

use std::fmt::Write;

use shopcat_cache::{CatalogSnapshot, SnapshotCache};

pub(crate) fn render_snapshot(user: &str, snapshot: Option<&CatalogSnapshot>) -> String {
    let Some(snapshot) = snapshot else {
        return format!("no cached snapshot for {user}");
    };

    let mut out = format!(
        "snapshot for {} (schema v{}, updated {})\n  {} products, {} collections",
        snapshot.user,
        snapshot.schema_version,
        snapshot.updated_at.to_rfc3339(),
        snapshot.products.len(),
        snapshot.collections.len()
    );
    for store in &snapshot.stores {
        let _ = write!(
            out,
            "\n  {}: {} products, {} collections, scraped {}",
            store.origin,
            store.product_ids.len(),
            store.collection_ids.len(),
            store.scraped_at.to_rfc3339()
        );
    }
    out
}

pub(crate) fn show(cache: &SnapshotCache, user: &str) -> String {
    render_snapshot(user, cache.load(user).as_ref())
}

pub(crate) fn clear(cache: &SnapshotCache, user: &str) {
    cache.clear(user);
    tracing::info!(user, "cleared cached snapshot");
}
