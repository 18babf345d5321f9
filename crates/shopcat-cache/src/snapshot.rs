use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopcat_core::{Collection, Product};

/// Snapshots written with any other version are discarded on load.
pub const SCHEMA_VERSION: u32 = 3;

/// Key used for callers without an account.
pub const ANONYMOUS_KEY: &str = "anon";

/// Cache key for a user: their email, or `"anon"`.
#[must_use]
pub fn cache_key(user_email: Option<&str>) -> String {
    user_email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map_or_else(|| ANONYMOUS_KEY.to_owned(), str::to_lowercase)
}

/// Compact per-product change record.
///
/// Exactly one of `updated_at` / `hash` is set: products with a timestamp
/// are tracked by it, products without one by their fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A store whose catalog is in the snapshot, with the ids it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStore {
    pub origin: String,
    #[serde(default)]
    pub product_ids: Vec<i64>,
    #[serde(default)]
    pub collection_ids: Vec<i64>,
    pub scraped_at: DateTime<Utc>,
}

/// Everything the client keeps between runs for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub products: Vec<Arc<Product>>,
    pub product_index: Vec<IndexEntry>,
    #[serde(default)]
    pub stores: Vec<CachedStore>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    pub updated_at: DateTime<Utc>,
    pub user: String,
    pub schema_version: u32,
}

impl CatalogSnapshot {
    /// Looks up a cached product by id.
    #[must_use]
    pub fn product(&self, id: i64) -> Option<&Arc<Product>> {
        self.products.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn store(&self, origin: &str) -> Option<&CachedStore> {
        self.stores.iter().find(|s| s.origin == origin)
    }

    /// The products and index entries owned by `origin`, as a snapshot of
    /// their own. `None` if the origin was never scraped into this snapshot.
    ///
    /// The returned products share allocations with `self`.
    #[must_use]
    pub fn store_slice(&self, origin: &str) -> Option<CatalogSnapshot> {
        let store = self.store(origin)?;
        let owned: HashSet<i64> = store.product_ids.iter().copied().collect();
        Some(CatalogSnapshot {
            products: self
                .products
                .iter()
                .filter(|p| owned.contains(&p.id))
                .cloned()
                .collect(),
            product_index: self
                .product_index
                .iter()
                .filter(|e| owned.contains(&e.id))
                .cloned()
                .collect(),
            stores: vec![store.clone()],
            collections: Vec::new(),
            updated_at: self.updated_at,
            user: self.user.clone(),
            schema_version: self.schema_version,
        })
    }
}
