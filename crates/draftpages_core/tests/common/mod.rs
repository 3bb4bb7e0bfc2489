#![allow(dead_code)]

use draftpages_core::capability::actor::{Actor, Role};
use draftpages_core::capability::gate::RoleCapabilityGate;
use draftpages_core::model::page::{Page, PageId, RegionMap};
use draftpages_core::repo::page_repo::{PageRepository, Projection, SqlitePageRepository};
use draftpages_core::repo::search_index::SqliteSearchIndexer;
use draftpages_core::repo::version_repo::SqliteVersionRecorder;
use draftpages_core::service::loaders::RegionLoaders;
use draftpages_core::service::PageHooks;
use rusqlite::Connection;
use serde_json::Value;

/// Repository plus every hook collaborator, all over one connection.
pub struct Stack<'c> {
    pub repo: SqlitePageRepository<'c>,
    pub versions: SqliteVersionRecorder<'c>,
    pub indexer: SqliteSearchIndexer<'c>,
    pub gate: RoleCapabilityGate,
    pub loaders: RegionLoaders,
}

impl<'c> Stack<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_loaders(conn, RegionLoaders::default())
    }

    pub fn with_loaders(conn: &'c Connection, loaders: RegionLoaders) -> Self {
        Self {
            repo: SqlitePageRepository::new(conn),
            versions: SqliteVersionRecorder::new(conn),
            indexer: SqliteSearchIndexer::new(conn),
            gate: RoleCapabilityGate,
            loaders,
        }
    }

    pub fn hooks(&self) -> PageHooks<'_> {
        PageHooks {
            gate: &self.gate,
            versions: &self.versions,
            indexer: &self.indexer,
            loaders: &self.loaders,
        }
    }

    pub fn seed(&self, page: &Page) -> PageId {
        self.repo.insert_page(page).unwrap()
    }

    pub fn load(&self, slug: &str) -> Page {
        self.repo
            .find_by_slug(slug, &Projection::full())
            .unwrap()
            .unwrap_or_else(|| panic!("page `{slug}` should exist"))
    }

    pub fn version_count(&self, page_id: PageId) -> usize {
        self.versions.list_versions(page_id).unwrap().len()
    }
}

pub fn admin() -> Actor {
    Actor::new("ada", Role::Admin)
}

pub fn editor() -> Actor {
    Actor::new("eve", Role::Editor)
}

pub fn contributor(id: &str) -> Actor {
    Actor::new(id, Role::Contributor)
}

pub fn guest() -> Actor {
    Actor::guest()
}

pub fn regions(value: Value) -> RegionMap {
    value
        .as_object()
        .cloned()
        .expect("regions must be a JSON object")
}

/// Published tree page with the given canonical regions.
pub fn tree_page(slug: &str, title: &str, areas: Value) -> Page {
    let mut page = Page::new(slug, title);
    page.areas = regions(areas);
    page.published = true;
    page
}
