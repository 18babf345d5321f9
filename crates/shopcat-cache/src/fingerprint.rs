//! Coarse change fingerprint for products without a usable `updated_at`.

use sha2::{Digest, Sha256};
use shopcat_core::Product;

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Fingerprints `{id, title, updated_at, variant count}`.
///
/// Deliberately coarse: it catches renames and variant additions/removals,
/// which are the edits that matter for list views, and nothing else. SHA-256
/// is used only because its output is stable across builds and platforms.
#[must_use]
pub fn fingerprint(product: &Product) -> String {
    let mut hasher = Sha256::new();
    hasher.update(product.id.to_le_bytes());
    hasher.update([0x1f]);
    hasher.update(product.title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(product.updated_at().unwrap_or_default().as_bytes());
    hasher.update([0x1f]);
    hasher.update((product.variant_count() as u64).to_le_bytes());

    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopcat_core::Variant;

    fn product(title: &str, variants: usize) -> Product {
        Product {
            id: 2,
            title: title.to_owned(),
            handle: "p".to_owned(),
            body_html: None,
            vendor: String::new(),
            product_type: String::new(),
            status: None,
            tags: Vec::new(),
            images: Vec::new(),
            variants: (0..variants)
                .map(|i| Variant {
                    id: i64::try_from(i).unwrap(),
                    product_id: Some(2),
                    title: "Default Title".to_owned(),
                    price: "1.00".to_owned(),
                    compare_at_price: None,
                    sku: None,
                    option1: None,
                    option2: None,
                    option3: None,
                    available: true,
                    updated_at: None,
                })
                .collect(),
            updated_at: None,
        }
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = fingerprint(&product("Tee", 1));
        assert_eq!(a, fingerprint(&product("Tee", 1)));
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_changes_with_title_or_variant_count() {
        let base = fingerprint(&product("Tee", 1));
        assert_ne!(base, fingerprint(&product("Tee v2", 1)));
        assert_ne!(base, fingerprint(&product("Tee", 2)));
    }

    #[test]
    fn fingerprint_ignores_fields_outside_the_coarse_set() {
        let mut edited = product("Tee", 1);
        edited.body_html = Some("<p>new copy</p>".to_owned());
        edited.tags = vec!["sale".to_owned()];
        assert_eq!(fingerprint(&product("Tee", 1)), fingerprint(&edited));
    }
}
