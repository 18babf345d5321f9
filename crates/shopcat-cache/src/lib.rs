//! Client-side catalog cache.
//!
//! Keeps one persisted [`CatalogSnapshot`] per user and merges freshly
//! scraped catalogs into it so that unchanged products keep the same
//! `Arc<Product>` allocation across refreshes.

pub mod error;
pub mod fingerprint;
pub mod reconcile;
pub mod snapshot;
pub mod store;

pub use error::CacheError;
pub use fingerprint::fingerprint;
pub use reconcile::{build_index, reconcile, reconcile_detailed, Reconciliation};
pub use snapshot::{cache_key, CachedStore, CatalogSnapshot, IndexEntry, SCHEMA_VERSION};
pub use store::{FileKvStore, KvStore, MemoryKvStore, SnapshotCache};
