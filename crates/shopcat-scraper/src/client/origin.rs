//! URL origin and domain extraction utilities for the Shopify client.

use crate::error::ScraperError;

/// Extracts the scheme+host origin from a user-supplied shop URL.
///
/// Given `"https://shop.example.com/collections/all"`, returns
/// `"https://shop.example.com"`. Input without a scheme (`"shop.example.com"`)
/// is treated as `https://`.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidShopUrl`] if the input is blank, does not
/// parse as a URL, has no host, or uses a scheme other than http(s).
pub fn extract_store_origin(shop_url: &str) -> Result<String, ScraperError> {
    let trimmed = shop_url.trim();
    if trimmed.is_empty() {
        return Err(invalid(shop_url, "shop URL is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    let url = reqwest::Url::parse(&candidate).map_err(|e| invalid(shop_url, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            shop_url,
            format!("unsupported scheme \"{}\"", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(shop_url, "URL has no host"));
    }

    Ok(url.origin().ascii_serialization())
}

fn invalid(shop_url: &str, reason: impl Into<String>) -> ScraperError {
    ScraperError::InvalidShopUrl {
        shop_url: shop_url.to_owned(),
        reason: reason.into(),
    }
}

/// Extracts the hostname from a URL for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
pub(super) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
