//! Ingestion-time normalization for Shopify's `tags` field.
//!
//! The public `products.json` endpoint returns tags as a JSON array, but
//! older themes and some proxies return the legacy comma-separated string.
//! Both shapes, plus `null`, collapse into `Vec<String>` here so the rest of
//! the workspace never sees the union.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    List(Vec<Option<String>>),
    Delimited(String),
}

pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTags>::deserialize(deserializer)?;
    Ok(match raw {
        None => Vec::new(),
        Some(RawTags::List(items)) => items
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect(),
        Some(RawTags::Delimited(s)) => split_delimited(&s),
    })
}

fn split_delimited(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `null` and missing both become the empty string.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_tags")]
        tags: Vec<String>,
    }

    fn tags_of(json: &str) -> Vec<String> {
        serde_json::from_str::<Holder>(json).unwrap().tags
    }

    #[test]
    fn array_form_is_kept() {
        assert_eq!(
            tags_of(r#"{"tags": ["blood orange", "ginger"]}"#),
            vec!["blood orange", "ginger"]
        );
    }

    #[test]
    fn delimited_string_is_split_and_trimmed() {
        assert_eq!(
            tags_of(r#"{"tags": "summer, sale ,, new"}"#),
            vec!["summer", "sale", "new"]
        );
    }

    #[test]
    fn null_and_missing_become_empty() {
        assert!(tags_of(r#"{"tags": null}"#).is_empty());
        assert!(tags_of("{}").is_empty());
    }

    #[test]
    fn empty_string_becomes_empty_vec() {
        assert!(tags_of(r#"{"tags": ""}"#).is_empty());
    }

    #[test]
    fn null_entries_inside_array_are_dropped() {
        assert_eq!(tags_of(r#"{"tags": ["a", null, " "]}"#), vec!["a"]);
    }
}
