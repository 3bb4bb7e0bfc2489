//! Draft lifecycle orchestrator.
//!
//! # Responsibility
//! - Commit overlays into canonical regions for a batch of pages.
//! - Revert (discard) overlays for a batch of pages.
//!
//! # Invariants
//! - Every page in a batch passes its capability check before any page is
//!   written.
//! - Pages are written one at a time, in the order given.
//! - Revert writes never record a version; commit writes always do.
//! - A failure stops the batch; pages already written stay written.

use crate::capability::actor::Actor;
use crate::model::page::{Page, PageId};
use crate::repo::page_repo::PageRepository;
use crate::service::page_writer::PageWriter;
use crate::service::{DraftError, DraftResult, PageHooks, Versioning};
use log::{error, info, warn};
use serde::Serialize;
use std::time::Instant;

/// Pages a batch transition wrote, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed: Vec<PageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Commit,
    Revert,
}

impl Transition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Revert => "revert",
        }
    }

    fn versioning(self) -> Versioning {
        match self {
            Self::Commit => Versioning::Record,
            Self::Revert => Versioning::Suppress,
        }
    }
}

/// Orchestrates commit/revert batches over a `PageRepository`.
pub struct DraftLifecycle<'a, R: PageRepository> {
    repo: &'a R,
    hooks: PageHooks<'a>,
}

impl<'a, R: PageRepository> DraftLifecycle<'a, R> {
    pub fn new(repo: &'a R, hooks: PageHooks<'a>) -> Self {
        Self { repo, hooks }
    }

    /// Discards the overlay of every page, requiring edit capability.
    pub fn revert(&self, actor: &Actor, page_ids: &[PageId]) -> DraftResult<BatchOutcome> {
        self.run(actor, page_ids, Transition::Revert)
    }

    /// Merges the overlay of every page into its canonical regions,
    /// requiring admin capability.
    pub fn commit(&self, actor: &Actor, page_ids: &[PageId]) -> DraftResult<BatchOutcome> {
        self.run(actor, page_ids, Transition::Commit)
    }

    fn run(
        &self,
        actor: &Actor,
        page_ids: &[PageId],
        transition: Transition,
    ) -> DraftResult<BatchOutcome> {
        let started_at = Instant::now();
        info!(
            "event=draft_{} module=draft_lifecycle status=start actor={} requested={}",
            transition.as_str(),
            actor.id,
            page_ids.len()
        );

        let outcome = self.run_inner(actor, page_ids, transition);
        match &outcome {
            Ok(batch) => info!(
                "event=draft_{} module=draft_lifecycle status=ok actor={} processed={} duration_ms={}",
                transition.as_str(),
                actor.id,
                batch.processed.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=draft_{} module=draft_lifecycle status=error actor={} duration_ms={} error_code={} error={}",
                transition.as_str(),
                actor.id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        outcome
    }

    fn run_inner(
        &self,
        actor: &Actor,
        page_ids: &[PageId],
        transition: Transition,
    ) -> DraftResult<BatchOutcome> {
        let mut pages = self.repo.find_by_ids(page_ids)?;
        if pages.len() < page_ids.len() {
            let missing = page_ids
                .iter()
                .filter(|id| pages.iter().all(|page| page.id != **id))
                .count();
            warn!(
                "event=draft_{} module=draft_lifecycle status=partial missing={}",
                transition.as_str(),
                missing
            );
        }

        for page in &pages {
            self.check_capability(actor, page, transition)?;
        }

        let writer = PageWriter::new(self.repo, self.hooks);
        let mut batch = BatchOutcome::default();
        for page in &mut pages {
            match transition {
                Transition::Commit => page.commit_overlay(),
                Transition::Revert => page.discard_overlay(),
            };
            writer.put_page(actor, page, transition.versioning())?;
            batch.processed.push(page.id);
        }
        Ok(batch)
    }

    fn check_capability(&self, actor: &Actor, page: &Page, transition: Transition) -> DraftResult<()> {
        let allowed = match transition {
            Transition::Commit => self.hooks.gate.can_admin(actor, page),
            Transition::Revert => self.hooks.gate.can_edit(actor, Some(page)),
        };
        if allowed {
            Ok(())
        } else {
            Err(DraftError::denied(&actor.id, page.slug.as_str()))
        }
    }
}
