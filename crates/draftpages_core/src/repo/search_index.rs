//! Search-text indexing for pages.
//!
//! # Responsibility
//! - Maintain `pages.search_text` from the title and canonical regions.
//!
//! # Invariants
//! - Only canonical content is indexed; overlay drafts stay unsearchable
//!   until committed.
//! - Markup is stripped and text is searchified before storage.

use crate::model::page::{PageRef, RegionMap};
use crate::model::region::searchify;
use crate::repo::page_repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));

/// Region keys that carry structure rather than readable text.
const NON_TEXT_KEYS: &[&str] = &["type", "slug", "id", "_id"];

/// Indexer invoked after page writes.
pub trait PageIndexer {
    fn index_page(&self, page: PageRef<'_>) -> RepoResult<()>;
}

/// SQLite-backed indexer writing `pages.search_text`.
pub struct SqliteSearchIndexer<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSearchIndexer<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PageIndexer for SqliteSearchIndexer<'_> {
    fn index_page(&self, page: PageRef<'_>) -> RepoResult<()> {
        let (slug, title, areas) = match page {
            PageRef::Page(page) => (page.slug.clone(), page.title.clone(), page.areas.clone()),
            PageRef::Slug(slug) => {
                let (title, areas_text): (String, String) = self
                    .conn
                    .query_row(
                        "SELECT title, areas FROM pages WHERE slug = ?1;",
                        [slug],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?
                    .ok_or_else(|| RepoError::SlugNotFound(slug.to_string()))?;
                let areas: RegionMap = serde_json::from_str(&areas_text).map_err(|err| {
                    RepoError::InvalidData(format!("invalid JSON in pages.areas: {err}"))
                })?;
                (slug.to_string(), title, areas)
            }
        };

        let search_text = build_search_text(&title, &areas);
        self.conn.execute(
            "UPDATE pages SET search_text = ?1 WHERE slug = ?2;",
            params![search_text, slug],
        )?;
        Ok(())
    }
}

/// Builds searchable text from a title and canonical regions.
pub fn build_search_text(title: &str, areas: &RegionMap) -> String {
    let mut fragments = vec![title.to_string()];
    for region in areas.values() {
        collect_text(region, &mut fragments);
    }
    let joined = fragments.join(" ");
    searchify(&MARKUP_TAG_RE.replace_all(&joined, " "))
}

fn collect_text(value: &Value, fragments: &mut Vec<String>) {
    match value {
        Value::String(text) => fragments.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                collect_text(item, fragments);
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                if !NON_TEXT_KEYS.contains(&key.as_str()) {
                    collect_text(field, fragments);
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
