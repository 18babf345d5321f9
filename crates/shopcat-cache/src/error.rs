use thiserror::Error;

/// Failures inside the cache layer. These never escape [`crate::SnapshotCache`]'s
/// `load`/`persist`; they are logged and treated as a cache miss or a skipped write.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry {key} could not be (de)serialized: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
