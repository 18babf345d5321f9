//! Merges a freshly scraped product list into the cached snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use shopcat_core::Product;

use crate::fingerprint::fingerprint;
use crate::snapshot::{CatalogSnapshot, IndexEntry};

/// Result of [`reconcile_detailed`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Output in the order of the fresh list.
    pub products: Vec<Arc<Product>>,
    /// Products whose cached allocation was reused.
    pub reused: usize,
    /// Products that were cached but changed.
    pub replaced: usize,
    /// Products not present in the cache.
    pub added: usize,
}

/// Merges `fresh` into `cached`, reusing the cached allocation for every
/// product that has not changed.
///
/// The output is ordered like `fresh`; products that disappeared from the
/// store are dropped.
#[must_use]
pub fn reconcile(fresh: Vec<Product>, cached: Option<&CatalogSnapshot>) -> Vec<Arc<Product>> {
    reconcile_detailed(fresh, cached).products
}

/// Same as [`reconcile`] but reports how many products were reused.
#[must_use]
pub fn reconcile_detailed(fresh: Vec<Product>, cached: Option<&CatalogSnapshot>) -> Reconciliation {
    let Some(cached) = cached else {
        let added = fresh.len();
        return Reconciliation {
            products: fresh.into_iter().map(Arc::new).collect(),
            reused: 0,
            replaced: 0,
            added,
        };
    };

    let index: HashMap<i64, &IndexEntry> =
        cached.product_index.iter().map(|e| (e.id, e)).collect();
    let previous: HashMap<i64, &Arc<Product>> =
        cached.products.iter().map(|p| (p.id, p)).collect();

    let mut out = Reconciliation {
        products: Vec::with_capacity(fresh.len()),
        reused: 0,
        replaced: 0,
        added: 0,
    };

    for product in fresh {
        match (index.get(&product.id), previous.get(&product.id)) {
            (Some(entry), Some(prev)) => {
                if is_unchanged(&product, entry) {
                    out.products.push(Arc::clone(prev));
                    out.reused += 1;
                } else {
                    out.products.push(Arc::new(product));
                    out.replaced += 1;
                }
            }
            _ => {
                out.products.push(Arc::new(product));
                out.added += 1;
            }
        }
    }

    tracing::debug!(
        reused = out.reused,
        replaced = out.replaced,
        added = out.added,
        "reconciled catalog against cache"
    );
    out
}

fn is_unchanged(fresh: &Product, entry: &IndexEntry) -> bool {
    let cached_ts = entry.updated_at.as_deref().filter(|s| !s.is_empty());
    match (fresh.updated_at(), cached_ts) {
        (Some(now), Some(before)) => now == before,
        (None, _) => entry
            .hash
            .as_deref()
            .is_some_and(|hash| hash == fingerprint(fresh)),
        (Some(_), None) => false,
    }
}

/// Builds the change index persisted alongside the products.
#[must_use]
pub fn build_index(products: &[Arc<Product>]) -> Vec<IndexEntry> {
    products
        .iter()
        .map(|p| match p.updated_at() {
            Some(ts) => IndexEntry {
                id: p.id,
                updated_at: Some(ts.to_owned()),
                hash: None,
            },
            None => IndexEntry {
                id: p.id,
                updated_at: None,
                hash: Some(fingerprint(p)),
            },
        })
        .collect()
}
