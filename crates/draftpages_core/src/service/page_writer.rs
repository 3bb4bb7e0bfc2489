//! Whole-page persistence with version and index side effects.

use crate::capability::actor::Actor;
use crate::model::page::{now_epoch_ms, Page, PageRef};
use crate::repo::page_repo::PageRepository;
use crate::service::{DraftResult, PageHooks, Versioning};
use log::debug;

/// Persists full page records through a `PageRepository`.
pub struct PageWriter<'a, R: PageRepository> {
    repo: &'a R,
    hooks: PageHooks<'a>,
}

impl<'a, R: PageRepository> PageWriter<'a, R> {
    pub fn new(repo: &'a R, hooks: PageHooks<'a>) -> Self {
        Self { repo, hooks }
    }

    /// Replaces the stored page, then records a version unless suppressed,
    /// then re-indexes it.
    pub fn put_page(
        &self,
        actor: &Actor,
        page: &mut Page,
        versioning: Versioning,
    ) -> DraftResult<()> {
        page.updated_at = now_epoch_ms();
        self.repo.replace_page(page)?;
        match versioning {
            Versioning::Record => self.hooks.versions.record_version(actor, PageRef::Page(page))?,
            Versioning::Suppress => {
                debug!(
                    "event=version_skip module=page_writer status=ok page_id={}",
                    page.id
                );
            }
        }
        self.hooks.indexer.index_page(PageRef::Page(page))?;
        Ok(())
    }
}
