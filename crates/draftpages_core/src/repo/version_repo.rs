//! Page version recording.
//!
//! # Responsibility
//! - Snapshot canonical regions whenever a page write is recorded.
//! - List recorded versions for one page.
//!
//! # Invariants
//! - Versions are append-only.
//! - Callers decide whether to record; this module never suppresses.

use crate::capability::actor::Actor;
use crate::model::page::{now_epoch_ms, PageId, PageRef, RegionMap};
use crate::repo::page_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Version-history sink invoked after page writes.
pub trait PageVersionRecorder {
    fn record_version(&self, actor: &Actor, page: PageRef<'_>) -> RepoResult<()>;
}

/// One recorded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PageVersion {
    pub id: i64,
    pub page_id: PageId,
    pub slug: String,
    pub author: Option<String>,
    pub areas: RegionMap,
    pub created_at: i64,
}

/// SQLite-backed version recorder writing to `page_versions`.
pub struct SqliteVersionRecorder<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRecorder<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Lists versions of one page, oldest first.
    pub fn list_versions(&self, page_id: PageId) -> RepoResult<Vec<PageVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page_id, slug, author, areas, created_at
             FROM page_versions
             WHERE page_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([page_id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            let page_id_text: String = row.get("page_id")?;
            let areas_text: String = row.get("areas")?;
            versions.push(PageVersion {
                id: row.get("id")?,
                page_id: parse_page_id(&page_id_text)?,
                slug: row.get("slug")?,
                author: row.get("author")?,
                areas: serde_json::from_str(&areas_text).map_err(|err| {
                    RepoError::InvalidData(format!("invalid JSON in page_versions.areas: {err}"))
                })?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(versions)
    }
}

impl PageVersionRecorder for SqliteVersionRecorder<'_> {
    fn record_version(&self, actor: &Actor, page: PageRef<'_>) -> RepoResult<()> {
        let (page_id, slug, areas): (String, String, String) = match page {
            PageRef::Page(page) => {
                let areas = serde_json::to_string(&page.areas).map_err(|err| {
                    RepoError::InvalidData(format!("failed to encode page areas: {err}"))
                })?;
                (page.id.to_string(), page.slug.clone(), areas)
            }
            PageRef::Slug(slug) => self
                .conn
                .query_row(
                    "SELECT id, slug, areas FROM pages WHERE slug = ?1;",
                    [slug],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?
                .ok_or_else(|| RepoError::SlugNotFound(slug.to_string()))?,
        };

        self.conn.execute(
            "INSERT INTO page_versions (page_id, slug, author, areas, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![page_id, slug, actor.id.as_str(), areas, now_epoch_ms()],
        )?;
        Ok(())
    }
}

fn parse_page_id(value: &str) -> RepoResult<PageId> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in page_versions.page_id"))
    })
}
