//! Catalog domain model for Shopify's public storefront JSON.
//!
//! ## Observed shape
//!
//! - `vendor` and `product_type` are plain strings and are frequently `""`.
//!   Empty values are kept as-is: they form their own facet group and the
//!   presentation layer decides how to label them.
//! - `tags` is normalized at deserialization time (see `tags.rs`).
//! - `updated_at` is an opaque timestamp string. Some storefront proxies
//!   omit it; it is never synthesized.
//! - `collections.json` occasionally returns entries with an empty or `null`
//!   `handle`. Those are dropped by the aggregator, not repaired.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tags::{deserialize_tags, null_as_empty};

/// A single product from a Shopify storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Shopify numeric product ID. Globally unique across stores.
    pub id: i64,

    pub title: String,

    /// URL slug; the stable natural key within one store.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub handle: String,

    #[serde(default)]
    pub body_html: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub vendor: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub product_type: String,

    /// Publication status. Usually absent from the public endpoint.
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub images: Vec<Image>,

    #[serde(default)]
    pub variants: Vec<Variant>,

    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Product {
    /// Returns `updated_at` only when it carries a non-empty value.
    #[must_use]
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref().filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Price of the first variant, which Shopify treats as the storefront default.
    #[must_use]
    pub fn primary_price(&self) -> Option<&str> {
        self.variants.first().map(|v| v.price.as_str())
    }
}

/// A purchasable variant, owned by its parent [`Product`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,

    #[serde(default)]
    pub product_id: Option<i64>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    /// Decimal string exactly as Shopify returns it, e.g. `"12.99"`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub price: String,

    #[serde(default)]
    pub compare_at_price: Option<String>,

    #[serde(default)]
    pub sku: Option<String>,

    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,

    /// Defaults to `true` when the storefront omits it.
    #[serde(default = "default_available")]
    pub available: bool,

    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_available() -> bool {
    true
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: Option<i64>,
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

/// A collection from `collections.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub handle: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    #[serde(default)]
    pub products_count: Option<i64>,
}

impl Collection {
    /// `true` when the collection has a non-empty handle and can be linked to.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.handle.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

/// One vendor group in the vendor facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorFacet {
    pub name: String,
    pub count: usize,
}

/// The full in-memory catalog for one storefront, including derived facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub products: Vec<Product>,
    pub collections: Vec<Collection>,
    pub vendors: Vec<VendorFacet>,
    pub product_types: Vec<String>,
}

impl Catalog {
    /// Assembles a catalog and computes its facets from `products`.
    #[must_use]
    pub fn from_parts(products: Vec<Product>, collections: Vec<Collection>) -> Self {
        let vendors = vendor_facets(&products);
        let product_types = product_types(&products);
        Self {
            products,
            collections,
            vendors,
            product_types,
        }
    }

    /// Copies the persisted shape out of the catalog.
    #[must_use]
    pub fn to_stored(&self) -> StoredCatalog {
        StoredCatalog {
            products: self.products.clone(),
            collections: self.collections.clone(),
        }
    }

    /// Drops the derived facets, leaving the persisted shape.
    #[must_use]
    pub fn into_stored(self) -> StoredCatalog {
        StoredCatalog {
            products: self.products,
            collections: self.collections,
        }
    }
}

/// The persisted form of a catalog. Facets are recomputed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCatalog {
    pub products: Vec<Product>,
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl From<StoredCatalog> for Catalog {
    fn from(stored: StoredCatalog) -> Self {
        Catalog::from_parts(stored.products, stored.collections)
    }
}

/// Groups products by vendor, sorted by vendor name.
///
/// The empty vendor is its own group and, being the smallest string, sorts first.
#[must_use]
pub fn vendor_facets(products: &[Product]) -> Vec<VendorFacet> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for product in products {
        *counts.entry(product.vendor.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(name, count)| VendorFacet {
            name: name.to_owned(),
            count,
        })
        .collect()
}

/// Distinct product types, sorted. `""` is retained as a real value.
#[must_use]
pub fn product_types(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|p| p.product_type.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}
