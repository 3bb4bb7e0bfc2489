//! Composite page reader.
//!
//! # Responsibility
//! - Compose search, tag, flag and permission filters into page queries.
//! - Merge overlay regions over canonical regions for editors.
//! - Attach per-page capability flags and run region loaders.
//!
//! # Invariants
//! - `total` counts pages matching the composed criteria, before any merge.
//! - Overlay content (merged or raw) is only returned to actors who can
//!   edit the page; everyone else gets `draft_areas = None`.
//! - Result pages are loaded one at a time, in result order.

use crate::capability::actor::Actor;
use crate::capability::gate::PageCapabilities;
use crate::model::page::Page;
use crate::model::region::searchify;
use crate::repo::criteria::{ComposedCriteria, Criteria, PageField};
use crate::repo::page_repo::{PageFind, PageRepository, Projection, RegionProjection, SortKey};
use crate::service::{DraftResult, PageHooks};
use log::{debug, error};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;

/// Three-state boolean filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolFilter {
    /// Flag must be set.
    Yes,
    /// Flag must be unset.
    No,
    /// No constraint.
    Any,
}

impl BoolFilter {
    fn criteria(self, field: PageField) -> Option<Criteria> {
        match self {
            Self::Yes => Some(Criteria::IsTrue(field)),
            Self::No => Some(Criteria::Not(Box::new(Criteria::IsTrue(field)))),
            Self::Any => None,
        }
    }
}

/// Which regions end up in result pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AreasSelector {
    #[default]
    All,
    None,
    /// Keep only these keys after the overlay merge.
    Only(BTreeSet<String>),
}

/// Result ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SortOption {
    /// `sort_title` ascending.
    #[default]
    Default,
    /// Store order.
    Unsorted,
    By(Vec<SortKey>),
}

/// Options for `CompositePageReader::query`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQueryOptions {
    /// Substring match on the searchified title.
    pub title_search: Option<String>,
    /// Substring match on indexed search text.
    pub q: Option<String>,
    pub tags: Option<Vec<String>>,
    pub not_tags: Option<Vec<String>>,
    /// Defaults to `BoolFilter::No`.
    pub trash: Option<BoolFilter>,
    /// Defaults to `BoolFilter::Any`.
    pub orphan: Option<BoolFilter>,
    /// Defaults to `BoolFilter::Any`.
    pub published: Option<BoolFilter>,
    pub sort: SortOption,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub projection: Projection,
    /// Scope results through the capability gate.
    pub permissions: bool,
    /// Narrow the permission scope to editable pages.
    pub editable_only: bool,
    pub areas: AreasSelector,
    /// Criteria attached outside the main conjunction.
    pub late_criteria: Option<Criteria>,
    /// Return canonical regions even to editors.
    pub canonical_only: bool,
}

impl Default for PageQueryOptions {
    fn default() -> Self {
        Self {
            title_search: None,
            q: None,
            tags: None,
            not_tags: None,
            trash: None,
            orphan: None,
            published: None,
            sort: SortOption::Default,
            skip: None,
            limit: None,
            projection: Projection::full(),
            permissions: true,
            editable_only: false,
            areas: AreasSelector::All,
            late_criteria: None,
            canonical_only: false,
        }
    }
}

/// One page as returned to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    #[serde(flatten)]
    pub page: Page,
    pub capabilities: PageCapabilities,
    /// Whether `page.areas` includes overlay content.
    pub overlay_applied: bool,
}

/// Paginated query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResultSet {
    pub total: u64,
    pub pages: Vec<PageView>,
}

/// Reader decorating a `PageRepository` with overlay composition.
pub struct CompositePageReader<'a, R: PageRepository> {
    repo: &'a R,
    hooks: PageHooks<'a>,
}

impl<'a, R: PageRepository> CompositePageReader<'a, R> {
    pub fn new(repo: &'a R, hooks: PageHooks<'a>) -> Self {
        Self { repo, hooks }
    }

    /// Runs the full query pipeline.
    ///
    /// Steps run in order (count, fetch, merge, flags, loaders) and the
    /// first failure aborts the query.
    pub fn query(
        &self,
        actor: &Actor,
        base: Criteria,
        options: &PageQueryOptions,
    ) -> DraftResult<PageResultSet> {
        let started_at = Instant::now();
        let criteria = self.compose(actor, base, options);
        let outcome = self.run_pipeline(actor, criteria, options);
        match &outcome {
            Ok(results) => debug!(
                "event=page_query module=page_reader status=ok actor={} total={} returned={} duration_ms={}",
                actor.id,
                results.total,
                results.pages.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=page_query module=page_reader status=error actor={} error_code={} error={}",
                actor.id,
                err.code(),
                err
            ),
        }
        outcome
    }

    /// Distinct values of `field` among pages the query would match.
    pub fn distinct(
        &self,
        actor: &Actor,
        base: Criteria,
        options: &PageQueryOptions,
        field: PageField,
    ) -> DraftResult<Vec<Value>> {
        let criteria = self.compose(actor, base, options);
        Ok(self.repo.distinct_values(field, &criteria)?)
    }

    /// Distinct tags among pages the query would match.
    pub fn distinct_tags(
        &self,
        actor: &Actor,
        base: Criteria,
        options: &PageQueryOptions,
    ) -> DraftResult<Vec<String>> {
        let criteria = self.compose(actor, base, options);
        Ok(self.repo.distinct_tags(&criteria)?)
    }

    /// Builds `base AND filters AND permission scope`, plus late criteria.
    pub fn compose(
        &self,
        actor: &Actor,
        base: Criteria,
        options: &PageQueryOptions,
    ) -> ComposedCriteria {
        let mut clauses = vec![base, Criteria::And(filter_criteria(options))];
        if options.permissions {
            clauses.push(
                self.hooks
                    .gate
                    .permission_scope(actor, options.editable_only),
            );
        }
        ComposedCriteria::new(Criteria::And(clauses)).with_late(options.late_criteria.clone())
    }

    fn run_pipeline(
        &self,
        actor: &Actor,
        criteria: ComposedCriteria,
        options: &PageQueryOptions,
    ) -> DraftResult<PageResultSet> {
        let total = self.repo.count_pages(&criteria)?;

        let mut find = PageFind::new(criteria);
        find.projection = effective_projection(options);
        find.sort = match &options.sort {
            SortOption::Default => vec![SortKey::asc(PageField::SortTitle)],
            SortOption::Unsorted => Vec::new(),
            SortOption::By(keys) => keys.clone(),
        };
        find.skip = options.skip;
        find.limit = options.limit;

        let mut pages: Vec<PageView> = self
            .repo
            .find_pages(&find)?
            .into_iter()
            .map(|page| self.compose_view(actor, page, options))
            .collect();

        for view in &mut pages {
            self.hooks.loaders.load_page(actor, &mut view.page)?;
        }

        Ok(PageResultSet { total, pages })
    }

    fn compose_view(&self, actor: &Actor, mut page: Page, options: &PageQueryOptions) -> PageView {
        page.strip_reserved_props();
        let capabilities = PageCapabilities::evaluate(self.hooks.gate, actor, &page);

        let mut overlay_applied = false;
        if !capabilities.can_edit {
            page.draft_areas = None;
        } else if !options.canonical_only && page.has_overlay() {
            page.areas = page.merged_areas();
            overlay_applied = true;
        }

        if let AreasSelector::Only(keys) = &options.areas {
            page.areas.retain(|key, _| keys.contains(key));
            if let Some(overlay) = page.draft_areas.as_mut() {
                overlay.retain(|key, _| keys.contains(key));
            }
            if page.draft_areas.as_ref().is_some_and(|overlay| overlay.is_empty()) {
                page.draft_areas = None;
            }
        }

        PageView {
            page,
            capabilities,
            overlay_applied,
        }
    }
}

fn filter_criteria(options: &PageQueryOptions) -> Vec<Criteria> {
    let mut filters = Vec::new();

    if let Some(title) = options.title_search.as_deref() {
        filters.push(Criteria::Contains(PageField::SortTitle, searchify(title)));
    }

    let flags = [
        (PageField::Trash, options.trash.unwrap_or(BoolFilter::No)),
        (PageField::Orphan, options.orphan.unwrap_or(BoolFilter::Any)),
        (
            PageField::Published,
            options.published.unwrap_or(BoolFilter::Any),
        ),
    ];
    filters.extend(
        flags
            .into_iter()
            .filter_map(|(field, filter)| filter.criteria(field)),
    );

    if let Some(tags) = &options.tags {
        filters.push(Criteria::TagsAny(tags.clone()));
    }
    if let Some(tags) = &options.not_tags {
        filters.push(Criteria::TagsNone(tags.clone()));
    }

    if let Some(q) = options.q.as_deref().filter(|q| !q.trim().is_empty()) {
        filters.push(Criteria::Contains(PageField::SearchText, searchify(q)));
    }

    filters
}

fn effective_projection(options: &PageQueryOptions) -> Projection {
    let mut projection = options.projection.clone();
    if options.areas == AreasSelector::None {
        projection.regions = RegionProjection::Exclude;
    }
    projection
}
