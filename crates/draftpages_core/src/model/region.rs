//! Region addressing and structural merge.

use crate::model::page::RegionMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static COMPOSITE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?):([A-Za-z0-9_]+)$").expect("valid composite key regex"));
static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid searchify regex"));

/// A `slug:regionKey` composite failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRegionKey(pub String);

impl Display for MalformedRegionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "region key `{}` must be page-based: page-slug:region",
            self.0
        )
    }
}

impl Error for MalformedRegionKey {}

/// Parsed `(page slug, region key)` address of one editable region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionAddress {
    pub page_slug: String,
    pub region_key: String,
}

impl RegionAddress {
    /// Parses a `slug:regionKey` composite.
    ///
    /// The slug may itself contain `:`; the region key is everything after
    /// the last one and must be a non-empty word.
    pub fn parse(composite: &str) -> Result<Self, MalformedRegionKey> {
        let malformed = || MalformedRegionKey(composite.to_string());
        let captures = COMPOSITE_KEY_RE.captures(composite).ok_or_else(malformed)?;
        let page_slug = captures.get(1).map_or("", |m| m.as_str());
        let region_key = captures.get(2).map_or("", |m| m.as_str());
        if page_slug.is_empty() || region_key.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            page_slug: page_slug.to_string(),
            region_key: region_key.to_string(),
        })
    }

    /// Returns the composite form.
    pub fn composite(&self) -> String {
        format!("{}:{}", self.page_slug, self.region_key)
    }

    /// Returns whether this region lives on a tree page.
    pub fn is_tree_page(&self) -> bool {
        !crate::model::page::is_virtual_slug(&self.page_slug)
    }
}

/// Deep-merges `overlay` into `target`.
///
/// Objects merge key by key, recursively. Any other overlay value (array,
/// scalar, null) replaces the target value whole.
pub fn deep_merge(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Merges every overlay region over the matching canonical region.
pub fn merge_regions(canonical: &mut RegionMap, overlay: &RegionMap) {
    for (key, region) in overlay {
        match canonical.get_mut(key) {
            Some(existing) => deep_merge(existing, region),
            None => {
                canonical.insert(key.clone(), region.clone());
            }
        }
    }
}

/// Normalizes free text for sort keys and substring search.
pub fn searchify(text: &str) -> String {
    NON_WORD_RE
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{deep_merge, searchify, RegionAddress};
    use serde_json::json;

    #[test]
    fn parses_virtual_and_tree_composites() {
        let address = RegionAddress::parse("global:footer").expect("virtual composite");
        assert_eq!(address.page_slug, "global");
        assert_eq!(address.region_key, "footer");
        assert!(!address.is_tree_page());

        let address = RegionAddress::parse("/about/team:body").expect("tree composite");
        assert_eq!(address.page_slug, "/about/team");
        assert!(address.is_tree_page());
        assert_eq!(address.composite(), "/about/team:body");
    }

    #[test]
    fn region_key_is_taken_after_last_colon() {
        let address = RegionAddress::parse("a:b:c").expect("nested colon");
        assert_eq!(address.page_slug, "a:b");
        assert_eq!(address.region_key, "c");
    }

    #[test]
    fn rejects_missing_parts() {
        for composite in ["badslug:", "noseparator", ":body", "slug:with-dash"] {
            assert!(
                RegionAddress::parse(composite).is_err(),
                "`{composite}` should be malformed"
            );
        }
    }

    #[test]
    fn deep_merge_recurses_into_objects_and_replaces_arrays() {
        let mut target = json!({
            "type": "area",
            "items": [{"type": "richText", "content": "old"}, {"type": "image"}],
            "meta": {"locale": "en", "rev": 1}
        });
        let overlay = json!({
            "items": [{"type": "richText", "content": "new"}],
            "meta": {"rev": 2}
        });
        deep_merge(&mut target, &overlay);
        assert_eq!(
            target,
            json!({
                "type": "area",
                "items": [{"type": "richText", "content": "new"}],
                "meta": {"locale": "en", "rev": 2}
            })
        );
    }

    #[test]
    fn searchify_collapses_punctuation() {
        assert_eq!(searchify("  Hello, World!  Café "), "hello world café");
    }
}
