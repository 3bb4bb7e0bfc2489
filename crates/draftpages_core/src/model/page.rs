//! Page domain model.
//!
//! # Responsibility
//! - Define the canonical page record and its embedded shadow overlay.
//! - Provide overlay lifecycle transitions (write, commit, discard).
//!
//! # Invariants
//! - `draft_areas` is `None` whenever the overlay has no entries.
//! - Canonical `areas` change only through `commit_overlay`.
//! - `sort_title` is always the searchified form of `title`.

use crate::model::region::{merge_regions, searchify};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for pages.
pub type PageId = Uuid;

/// Region-key -> region content mapping.
pub type RegionMap = Map<String, Value>;

/// Slug prefix used by hierarchical (tree) pages.
pub const TREE_SLUG_PREFIX: char = '/';

/// Prefix of `props` keys reserved for computed, never-persisted values.
pub const RESERVED_PROP_PREFIX: char = '_';

/// Reference to a page handed to write side effects.
///
/// Region writes that updated a row in place only know the slug; writes that
/// hold the page record pass it directly.
#[derive(Debug, Clone, Copy)]
pub enum PageRef<'a> {
    Page(&'a Page),
    Slug(&'a str),
}

impl PageRef<'_> {
    pub fn slug(&self) -> &str {
        match self {
            Self::Page(page) => page.slug.as_str(),
            Self::Slug(slug) => slug,
        }
    }
}

/// Canonical page document with its embedded draft overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// Unique human-readable key. Tree pages start with `/`.
    pub slug: String,
    pub title: String,
    /// Searchified `title`, used as the default sort key.
    pub sort_title: String,
    pub page_type: Option<String>,
    pub tags: Vec<String>,
    /// Canonical regions.
    pub areas: RegionMap,
    /// Shadow overlay of not-yet-committed region edits.
    pub draft_areas: Option<RegionMap>,
    /// Actor ids with page-level edit rights.
    pub editors: Vec<String>,
    /// Free-form page properties.
    pub props: Map<String, Value>,
    /// Lowercase text maintained by the indexer.
    pub search_text: String,
    pub published: bool,
    pub trash: bool,
    pub orphan: bool,
    pub last_edit_author: Option<String>,
    /// Unix epoch milliseconds.
    pub last_edit_time: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Page {
    /// Creates an unpublished page with a generated stable ID.
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        let title = title.into();
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            sort_title: searchify(&title),
            title,
            page_type: None,
            tags: Vec::new(),
            areas: RegionMap::new(),
            draft_areas: None,
            editors: Vec::new(),
            props: Map::new(),
            search_text: String::new(),
            published: false,
            trash: false,
            orphan: false,
            last_edit_author: None,
            last_edit_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a typeless virtual page whose only content is one overlay entry.
    ///
    /// Used by the region store when the first draft write targets a slug
    /// that does not exist yet.
    pub fn new_virtual_draft(
        slug: impl Into<String>,
        region_key: impl Into<String>,
        content: Value,
        author: impl Into<String>,
    ) -> Self {
        let mut page = Self::new(slug, "");
        page.set_overlay_region(region_key, content, author);
        page
    }

    /// Returns whether the overlay holds at least one region.
    pub fn has_overlay(&self) -> bool {
        self.overlay().is_some()
    }

    /// Returns the overlay, treating an empty mapping as absent.
    pub fn overlay(&self) -> Option<&RegionMap> {
        self.draft_areas.as_ref().filter(|overlay| !overlay.is_empty())
    }

    /// Adds or replaces one overlay region and stamps the editor.
    pub fn set_overlay_region(
        &mut self,
        region_key: impl Into<String>,
        content: Value,
        author: impl Into<String>,
    ) {
        self.draft_areas
            .get_or_insert_with(RegionMap::new)
            .insert(region_key.into(), content);
        self.last_edit_author = Some(author.into());
        self.last_edit_time = Some(now_epoch_ms());
    }

    /// Returns canonical regions with the overlay merged over them.
    pub fn merged_areas(&self) -> RegionMap {
        let mut merged = self.areas.clone();
        if let Some(overlay) = self.overlay() {
            merge_regions(&mut merged, overlay);
        }
        merged
    }

    /// Merges the overlay into canonical regions and clears it.
    ///
    /// Returns `false` when there was nothing to commit.
    pub fn commit_overlay(&mut self) -> bool {
        let Some(overlay) = self.draft_areas.take() else {
            return false;
        };
        if overlay.is_empty() {
            return false;
        }
        merge_regions(&mut self.areas, &overlay);
        true
    }

    /// Drops the overlay without touching canonical regions.
    ///
    /// Returns `false` when there was nothing to discard.
    pub fn discard_overlay(&mut self) -> bool {
        self.draft_areas
            .take()
            .is_some_and(|overlay| !overlay.is_empty())
    }

    /// Removes computed `_`-prefixed properties.
    pub fn strip_reserved_props(&mut self) {
        self.props
            .retain(|key, _| !key.starts_with(RESERVED_PROP_PREFIX));
    }
}

/// Returns whether `slug` names a non-hierarchical page.
pub fn is_virtual_slug(slug: &str) -> bool {
    !slug.starts_with(TREE_SLUG_PREFIX)
}

/// Current Unix time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
