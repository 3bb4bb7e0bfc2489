//! Overlay region store.
//!
//! # Responsibility
//! - Write one region into a page's draft overlay.
//! - Create typeless virtual pages on their first draft write.
//!
//! # Invariants
//! - Canonical regions are never touched by region writes.
//! - Page creation is a single insert without retry; losing a creation race
//!   surfaces `RepoError::DuplicateSlug` to the caller.
//! - Tree pages are never created here.

use crate::capability::actor::Actor;
use crate::model::page::{now_epoch_ms, Page, PageId, PageRef};
use crate::model::region::RegionAddress;
use crate::repo::criteria::{Criteria, PageField};
use crate::repo::page_repo::{PageRepository, Projection};
use crate::service::page_reader::{
    AreasSelector, BoolFilter, CompositePageReader, PageQueryOptions, SortOption,
};
use crate::service::{DraftError, DraftResult, PageHooks};
use log::{info, warn};
use serde_json::Value;
use std::time::Instant;

/// Outcome of one region write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionWrite {
    pub slug: String,
    pub region_key: String,
    /// Id of the virtual page created by this write, if any.
    pub created_page: Option<PageId>,
}

/// Region store decorating a `PageRepository` with overlay writes.
pub struct OverlayRegionStore<'a, R: PageRepository> {
    repo: &'a R,
    hooks: PageHooks<'a>,
}

impl<'a, R: PageRepository> OverlayRegionStore<'a, R> {
    pub fn new(repo: &'a R, hooks: PageHooks<'a>) -> Self {
        Self { repo, hooks }
    }

    /// Writes `content` into the overlay region addressed by
    /// `slug:regionKey`.
    ///
    /// Object content is stamped with a `slug` field holding the composite
    /// key. On success a version is recorded and the page is re-indexed.
    pub fn put_region(
        &self,
        actor: &Actor,
        composite_key: &str,
        content: Value,
    ) -> DraftResult<RegionWrite> {
        let started_at = Instant::now();
        let outcome = self.put_region_inner(actor, composite_key, content);
        match &outcome {
            Ok(write) => info!(
                "event=region_put module=overlay_store status=ok actor={} slug={} region={} created={} duration_ms={}",
                actor.id,
                write.slug,
                write.region_key,
                write.created_page.is_some(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=region_put module=overlay_store status=error actor={} key={} error_code={} error={}",
                actor.id,
                composite_key,
                err.code(),
                err
            ),
        }
        outcome
    }

    fn put_region_inner(
        &self,
        actor: &Actor,
        composite_key: &str,
        mut content: Value,
    ) -> DraftResult<RegionWrite> {
        let address = RegionAddress::parse(composite_key)?;
        self.check_write_permission(actor, &address)?;

        if let Value::Object(fields) = &mut content {
            fields.insert("slug".to_string(), Value::String(address.composite()));
        }

        let matched = self.repo.set_overlay_region(
            &address.page_slug,
            &address.region_key,
            &content,
            &actor.id,
            now_epoch_ms(),
        )?;

        let created = if matched == 0 {
            if address.is_tree_page() {
                return Err(DraftError::NotFound(address.page_slug));
            }
            let page = Page::new_virtual_draft(
                address.page_slug.as_str(),
                address.region_key.as_str(),
                content,
                actor.id.as_str(),
            );
            self.repo.insert_page(&page)?;
            Some(page)
        } else {
            None
        };

        let page_ref = match &created {
            Some(page) => PageRef::Page(page),
            None => PageRef::Slug(&address.page_slug),
        };
        self.hooks.versions.record_version(actor, page_ref)?;
        self.hooks.indexer.index_page(page_ref)?;

        Ok(RegionWrite {
            created_page: created.map(|page| page.id),
            slug: address.page_slug,
            region_key: address.region_key,
        })
    }

    fn check_write_permission(&self, actor: &Actor, address: &RegionAddress) -> DraftResult<()> {
        let reader = CompositePageReader::new(self.repo, self.hooks);
        let options = PageQueryOptions {
            trash: Some(BoolFilter::Any),
            sort: SortOption::Unsorted,
            limit: Some(1),
            projection: Projection::identity(),
            editable_only: true,
            areas: AreasSelector::None,
            ..PageQueryOptions::default()
        };
        let visible = reader.query(
            actor,
            Criteria::eq_text(PageField::Slug, address.page_slug.as_str()),
            &options,
        )?;

        if let Some(view) = visible.pages.first() {
            if view.capabilities.can_edit {
                return Ok(());
            }
            return Err(DraftError::denied(&actor.id, address.page_slug.as_str()));
        }

        if address.is_tree_page() {
            return Err(DraftError::NotFound(address.page_slug.clone()));
        }

        // The scoped query cannot tell "hidden" from "missing".
        let existing = self
            .repo
            .find_by_slug(&address.page_slug, &Projection::identity())?;
        if self.hooks.gate.can_edit(actor, existing.as_ref()) {
            Ok(())
        } else {
            Err(DraftError::denied(&actor.id, address.page_slug.as_str()))
        }
    }
}
