//! Snapshot persistence.
//!
//! [`KvStore`] is the raw byte store; [`SnapshotCache`] layers the snapshot
//! format, schema gating and user scoping on top. Cache failures are never
//! fatal: reads degrade to a miss and writes are skipped with a warning.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Deserialize;
use shopcat_core::{Catalog, Collection, Product};

use crate::error::CacheError;
use crate::reconcile::{build_index, reconcile_detailed, Reconciliation};
use crate::snapshot::{CachedStore, CatalogSnapshot, SCHEMA_VERSION};

/// A minimal key/value byte store.
pub trait KvStore: Send + Sync {
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backing medium fails.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// # Errors
    ///
    /// Returns [`CacheError`] when the backing medium fails.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backing medium fails.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("snapshot-{}.json", encode_key(key)))
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9@._-]` so distinct keys
/// always map to distinct file names.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'@' | b'.' | b'_' | b'-') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| CacheError::Io {
            key: key.to_owned(),
            source,
        };
        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// Process-local store used when no directory is usable, and in tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot cache
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    #[serde(default)]
    schema_version: Option<u32>,
}

/// User-scoped snapshot cache.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").finish_non_exhaustive()
    }
}

impl SnapshotCache {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// File-backed cache at `dir`, or an in-memory one if the directory
    /// cannot be created.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        match FileKvStore::open(dir) {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "cache directory unavailable; using in-memory cache");
                Self::new(Arc::new(MemoryKvStore::new()))
            }
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// Loads the snapshot for `user`.
    ///
    /// Returns `None` when nothing is cached, the entry is unreadable, it was
    /// written with a different schema version, or it belongs to another user.
    #[must_use]
    pub fn load(&self, user: &str) -> Option<CatalogSnapshot> {
        let bytes = match self.store.get(user) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(user, error = %e, "failed to read cached snapshot");
                return None;
            }
        };

        let version = serde_json::from_slice::<VersionProbe>(&bytes)
            .ok()
            .and_then(|probe| probe.schema_version);
        if version != Some(SCHEMA_VERSION) {
            tracing::debug!(user, ?version, "discarding snapshot with mismatched schema");
            return None;
        }

        match serde_json::from_slice::<CatalogSnapshot>(&bytes) {
            Ok(snapshot) if snapshot.user == user => Some(snapshot),
            Ok(snapshot) => {
                tracing::debug!(user, owner = %snapshot.user, "snapshot belongs to another user");
                None
            }
            Err(e) => {
                tracing::warn!(user, error = %e, "cached snapshot is corrupt");
                None
            }
        }
    }

    /// Writes `snapshot` under its own user key. Failures are logged.
    pub fn persist(&self, snapshot: &CatalogSnapshot) {
        if let Err(e) = self.try_persist(snapshot) {
            tracing::warn!(user = %snapshot.user, error = %e, "failed to persist snapshot");
        }
    }

    fn try_persist(&self, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(snapshot).map_err(|source| CacheError::Serde {
            key: snapshot.user.clone(),
            source,
        })?;
        self.store.put(&snapshot.user, &bytes)
    }

    /// Removes the snapshot for `user`. Failures are logged.
    pub fn clear(&self, user: &str) {
        if let Err(e) = self.store.delete(user) {
            tracing::warn!(user, error = %e, "failed to clear snapshot");
        }
    }

    /// Reconciles a freshly scraped catalog for `origin` into the user's
    /// snapshot and persists the result.
    ///
    /// Only the products `origin` owned last time take part in
    /// reconciliation. Products and collections of other stores are carried
    /// over unchanged, and the index is rebuilt over the union.
    pub fn apply(&self, user: &str, origin: &str, catalog: Catalog) -> (CatalogSnapshot, Reconciliation) {
        let previous = self.load(user);
        let slice = previous.as_ref().and_then(|p| p.store_slice(origin));
        let reconciliation = reconcile_detailed(catalog.products, slice.as_ref());
        let fresh_collections: Vec<Collection> = catalog.collections;

        let (mut stores, mut products, mut collections) = match previous {
            Some(previous) => retain_other_stores(previous, origin),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };
        let fresh_ids: HashSet<i64> = reconciliation.products.iter().map(|p| p.id).collect();
        products.retain(|p| !fresh_ids.contains(&p.id));

        stores.push(CachedStore {
            origin: origin.to_owned(),
            product_ids: reconciliation.products.iter().map(|p| p.id).collect(),
            collection_ids: fresh_collections.iter().map(|c| c.id).collect(),
            scraped_at: Utc::now(),
        });
        products.extend(reconciliation.products.iter().cloned());
        collections.extend(fresh_collections);

        let snapshot = CatalogSnapshot {
            product_index: build_index(&products),
            products,
            stores,
            collections,
            updated_at: Utc::now(),
            user: user.to_owned(),
            schema_version: SCHEMA_VERSION,
        };
        self.persist(&snapshot);
        (snapshot, reconciliation)
    }
}

/// Splits out every store except `origin`, with the products and
/// collections those stores own.
fn retain_other_stores(
    previous: CatalogSnapshot,
    origin: &str,
) -> (Vec<CachedStore>, Vec<Arc<Product>>, Vec<Collection>) {
    let stores: Vec<CachedStore> = previous
        .stores
        .into_iter()
        .filter(|s| s.origin != origin)
        .collect();
    let product_ids: HashSet<i64> = stores
        .iter()
        .flat_map(|s| s.product_ids.iter().copied())
        .collect();
    let collection_ids: HashSet<i64> = stores
        .iter()
        .flat_map(|s| s.collection_ids.iter().copied())
        .collect();

    let products = previous
        .products
        .into_iter()
        .filter(|p| product_ids.contains(&p.id))
        .collect();
    let collections = previous
        .collections
        .into_iter()
        .filter(|c| collection_ids.contains(&c.id))
        .collect();
    (stores, products, collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: i64, updated_at: &str) -> Product {
        serde_json::from_value(json!({
            "id": id,
            "title": format!("Product {id}"),
            "handle": format!("p-{id}"),
            "vendor": "Acme",
            "updated_at": updated_at
        }))
        .unwrap()
    }

    fn catalog(products: Vec<Product>) -> Catalog {
        Catalog::from_parts(products, Vec::new())
    }

    #[test]
    fn encode_key_is_filesystem_safe() {
        assert_eq!(encode_key("ada@example.com"), "ada@example.com");
        assert_eq!(encode_key("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("nested")).unwrap();
        assert!(store.get("anon").unwrap().is_none());
        store.put("anon", b"{}").unwrap();
        assert_eq!(store.get("anon").unwrap().as_deref(), Some(&b"{}"[..]));
        store.delete("anon").unwrap();
        store.delete("anon").unwrap();
        assert!(store.get("anon").unwrap().is_none());
    }

    #[test]
    fn apply_then_load_preserves_unchanged_products() {
        let cache = SnapshotCache::in_memory();
        let (first, _) = cache.apply(
            "anon",
            "https://a.example",
            catalog(vec![product(1, "t1"), product(2, "t2")]),
        );

        let loaded = cache.load("anon").unwrap();
        assert_eq!(loaded.products.len(), 2);
        assert_eq!(loaded.stores.len(), 1);

        let (second, stats) = cache.apply(
            "anon",
            "https://a.example",
            catalog(vec![product(1, "t1"), product(2, "t2-new")]),
        );
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.replaced, 1);
        assert_eq!(second.products[0], first.products[0]);
        assert_eq!(second.stores.len(), 1, "same origin replaces its entry");
    }

    #[test]
    fn stores_keep_their_own_products_across_origins() {
        let cache = SnapshotCache::in_memory();
        let (first, _) = cache.apply(
            "anon",
            "https://a.example",
            catalog(vec![product(1, "t1"), product(2, "t2")]),
        );
        cache.apply("anon", "https://b.example", catalog(vec![product(10, "t10")]));

        let both = cache.load("anon").unwrap();
        assert_eq!(both.products.len(), 3);
        assert_eq!(both.product_index.len(), 3);
        for store in &both.stores {
            for id in &store.product_ids {
                assert!(both.product(*id).is_some(), "{} claims missing {id}", store.origin);
            }
        }
        assert_eq!(both.store("https://a.example").unwrap().product_ids, vec![1, 2]);

        let (again, stats) = cache.apply(
            "anon",
            "https://a.example",
            catalog(vec![product(1, "t1"), product(2, "t2")]),
        );
        assert_eq!(stats.reused, 2);
        assert_eq!(stats.added, 0);
        assert!(Arc::ptr_eq(again.product(1).unwrap(), first.product(1).unwrap()));
        assert!(again.product(10).is_some(), "other store survives a rescrape");
        assert_eq!(again.products.len(), 3);
    }

    #[test]
    fn rescrape_drops_products_the_store_no_longer_lists() {
        let cache = SnapshotCache::in_memory();
        cache.apply("anon", "https://a.example", catalog(vec![product(1, "t1"), product(2, "t2")]));
        cache.apply("anon", "https://b.example", catalog(vec![product(10, "t10")]));
        let (snapshot, _) =
            cache.apply("anon", "https://a.example", catalog(vec![product(2, "t2")]));

        assert!(snapshot.product(1).is_none());
        let mut ids: Vec<i64> = snapshot.products.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 10]);
    }

    #[test]
    fn load_discards_other_schema_versions() {
        let store = Arc::new(MemoryKvStore::new());
        let old = json!({
            "products": [],
            "productIndex": [],
            "updatedAt": "2026-01-01T00:00:00Z",
            "user": "anon",
            "schemaVersion": 1
        });
        store.put("anon", &serde_json::to_vec(&old).unwrap()).unwrap();
        let cache = SnapshotCache::new(store.clone());
        assert!(cache.load("anon").is_none());

        let mut current = old;
        current["schemaVersion"] = json!(SCHEMA_VERSION);
        store.put("anon", &serde_json::to_vec(&current).unwrap()).unwrap();
        assert!(cache.load("anon").is_some());
    }

    #[test]
    fn load_treats_corrupt_entries_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.put("anon", b"{not json").unwrap();
        let cache = SnapshotCache::new(Arc::new(store));
        assert!(cache.load("anon").is_none());
    }

    #[test]
    fn snapshots_are_scoped_per_user() {
        let cache = SnapshotCache::in_memory();
        cache.apply("ada@example.com", "https://a.example", catalog(vec![product(1, "t1")]));
        assert!(cache.load("anon").is_none());
        assert!(cache.load("ada@example.com").is_some());
        cache.clear("ada@example.com");
        assert!(cache.load("ada@example.com").is_none());
    }

    #[test]
    fn open_falls_back_to_memory_when_dir_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();
        let cache = SnapshotCache::open(file.join("cache"));
        cache.apply("anon", "https://a.example", catalog(vec![product(1, "t1")]));
        assert!(cache.load("anon").is_some());
    }
}
