pub mod app_config;
pub mod catalog;
pub mod config;
pub mod stream;
mod tags;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    product_types, vendor_facets, Catalog, Collection, Image, Product, StoredCatalog, Variant,
    VendorFacet,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use stream::{EventDecoder, ScrapeEvent, StreamDecodeError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
