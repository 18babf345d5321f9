use std::borrow::Cow;
use std::fmt::Write;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use shopcat_core::StoredCatalog;
use shopcat_db::ProductListItemRow;

const CATALOG_HEADER: &str =
    "id,handle,title,vendor,product_type,tags,variant_count,price,updated_at\n";
const LIST_HEADER: &str = "store_origin,product_id,handle,title,added_at\n";

/// Quotes a field when it contains a delimiter, quote, or line break.
fn field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub(super) fn catalog_csv(catalog: &StoredCatalog) -> String {
    let mut csv = String::from(CATALOG_HEADER);
    for product in &catalog.products {
        let tags = product.tags.join(", ");
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{}",
            product.id,
            field(&product.handle),
            field(&product.title),
            field(&product.vendor),
            field(&product.product_type),
            field(&tags),
            product.variant_count(),
            field(product.primary_price().unwrap_or_default()),
            field(product.updated_at().unwrap_or_default()),
        );
    }
    csv
}

pub(super) fn list_csv(items: &[ProductListItemRow]) -> String {
    let mut csv = String::from(LIST_HEADER);
    for item in items {
        let _ = writeln!(
            csv,
            "{},{},{},{},{}",
            field(&item.store_origin),
            item.product_id,
            field(&item.handle),
            field(&item.title),
            item.added_at.to_rfc3339(),
        );
    }
    csv
}

/// Turns an origin into a filename stem: `https://shop.example.com:8443`
/// becomes `shop.example.com-8443`.
pub(super) fn filename_stem(origin: &str) -> String {
    let host = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}

pub(super) fn csv_response(filename: &str, body: String) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
