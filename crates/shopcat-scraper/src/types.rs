//! Response envelopes for Shopify's public storefront JSON endpoints.
//!
//! `GET /products.json?limit=250&page=N` returns `{"products": [...]}`; an
//! empty array marks the end of the catalog. `GET /collections.json` returns
//! `{"collections": [...]}` and is treated as a single page.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use shopcat_core::{Collection, Product};

/// A page-numbered storefront endpoint and the item type it yields.
pub trait PagedResource: DeserializeOwned {
    type Item;

    /// Path under the store origin, e.g. `"products.json"`.
    const PATH: &'static str;
    /// Plural noun used in progress messages and errors.
    const LABEL: &'static str;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Top-level response from `GET /products.json`.
#[derive(Debug, Deserialize)]
pub struct ProductsPage {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl PagedResource for ProductsPage {
    type Item = Product;
    const PATH: &'static str = "products.json";
    const LABEL: &'static str = "products";

    fn into_items(self) -> Vec<Product> {
        self.products
    }
}

/// Top-level response from `GET /collections.json`.
#[derive(Debug, Deserialize)]
pub struct CollectionsPage {
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl PagedResource for CollectionsPage {
    type Item = Collection;
    const PATH: &'static str = "collections.json";
    const LABEL: &'static str = "collections";

    fn into_items(self) -> Vec<Collection> {
        self.collections
    }
}
