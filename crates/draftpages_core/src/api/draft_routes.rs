//! `/draft-pages/*` route handlers.

use crate::capability::actor::Actor;
use crate::model::page::PageId;
use crate::repo::criteria::{Criteria, PageField};
use crate::repo::page_repo::{PageRepository, SortKey};
use crate::service::draft_lifecycle::{BatchOutcome, DraftLifecycle};
use crate::service::page_reader::{CompositePageReader, PageQueryOptions, SortOption};
use crate::service::{DraftError, DraftResult, PageHooks};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const LIST_DRAFTS_PATH: &str = "/draft-pages/list-drafts";
pub const REVERT_PATH: &str = "/draft-pages/revert";
pub const COMMIT_PATH: &str = "/draft-pages/commit";

/// Handler response ready to be written by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: u16,
    pub body: Value,
}

impl RouteResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn from_error(err: &DraftError) -> Self {
        Self {
            status: 500,
            body: json!({ "error": err.to_string(), "code": err.code() }),
        }
    }
}

/// Query parameters of `list-drafts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListDraftsParams {
    /// `time` or `author`; anything else uses the reader's default order.
    pub sort: Option<String>,
    /// `asc`; anything else is descending.
    pub order: Option<String>,
}

impl ListDraftsParams {
    /// Parses `sort=..&order=..` from a raw, form-urlencoded query string.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::default();
        let pairs = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes());
        for (key, value) in pairs {
            match key.as_ref() {
                "sort" => params.sort = Some(value.into_owned()),
                "order" => params.order = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn sort_option(&self) -> SortOption {
        let field = match self.sort.as_deref() {
            Some("time") => PageField::LastEditTime,
            Some("author") => PageField::LastEditAuthor,
            _ => return SortOption::Default,
        };
        let key = if self.order.as_deref() == Some("asc") {
            SortKey::asc(field)
        } else {
            SortKey::desc(field)
        };
        SortOption::By(vec![key])
    }
}

/// Body of `revert` and `commit`.
///
/// A singular `page_id` takes precedence over `page_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageIdsBody {
    pub page_id: Option<String>,
    pub page_ids: Option<Vec<String>>,
}

impl PageIdsBody {
    pub fn page_ids(&self) -> DraftResult<Vec<PageId>> {
        let raw: Vec<&str> = match (&self.page_id, &self.page_ids) {
            (Some(id), _) => vec![id.as_str()],
            (None, Some(ids)) => ids.iter().map(String::as_str).collect(),
            (None, None) => Vec::new(),
        };
        raw.into_iter()
            .map(|value| {
                Uuid::parse_str(value.trim())
                    .map_err(|_| DraftError::InvalidPageId(value.to_string()))
            })
            .collect()
    }
}

/// One row of the drafts listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftListingRow {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    pub last_edit_author: Option<String>,
    pub last_edit_time: Option<i64>,
    /// Region keys with pending edits; empty for actors who cannot edit.
    pub draft_regions: Vec<String>,
}

/// Route handlers over one repository.
pub struct DraftRoutes<'a, R: PageRepository> {
    repo: &'a R,
    hooks: PageHooks<'a>,
    list_limit: Option<u32>,
}

impl<'a, R: PageRepository> DraftRoutes<'a, R> {
    pub fn new(repo: &'a R, hooks: PageHooks<'a>) -> Self {
        Self {
            repo,
            hooks,
            list_limit: None,
        }
    }

    /// Caps the number of rows `list-drafts` returns.
    pub fn with_list_limit(mut self, limit: Option<u32>) -> Self {
        self.list_limit = limit;
        self
    }

    /// Routes one request by method and path.
    ///
    /// `body` is the JSON request body for `POST` routes.
    pub fn dispatch(
        &self,
        actor: &Actor,
        method: &str,
        path: &str,
        query: &str,
        body: &str,
    ) -> RouteResponse {
        match (method, path) {
            ("GET", LIST_DRAFTS_PATH) => {
                self.list_drafts(actor, &ListDraftsParams::from_query_string(query))
            }
            ("POST", REVERT_PATH) | ("POST", COMMIT_PATH) => {
                let parsed: PageIdsBody = if body.trim().is_empty() {
                    PageIdsBody::default()
                } else {
                    match serde_json::from_str(body) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            warn!(
                                "event=route_body module=api status=error path={path} error={err}"
                            );
                            return RouteResponse::failure(
                                500,
                                format!("invalid request body: {err}"),
                            );
                        }
                    }
                };
                if path == REVERT_PATH {
                    self.revert(actor, &parsed)
                } else {
                    self.commit(actor, &parsed)
                }
            }
            _ => RouteResponse::failure(404, format!("no route for {method} {path}")),
        }
    }

    /// `GET /draft-pages/list-drafts`: pages with a non-empty overlay.
    pub fn list_drafts(&self, actor: &Actor, params: &ListDraftsParams) -> RouteResponse {
        let reader = CompositePageReader::new(self.repo, self.hooks);
        let options = PageQueryOptions {
            late_criteria: Some(Criteria::HasOverlay),
            sort: params.sort_option(),
            limit: self.list_limit,
            ..PageQueryOptions::default()
        };

        match reader.query(actor, Criteria::Everything, &options) {
            Ok(results) => {
                let rows: Vec<DraftListingRow> = results
                    .pages
                    .into_iter()
                    .map(|view| DraftListingRow {
                        draft_regions: view
                            .page
                            .draft_areas
                            .as_ref()
                            .map(|overlay| overlay.keys().cloned().collect())
                            .unwrap_or_default(),
                        id: view.page.id,
                        slug: view.page.slug,
                        title: view.page.title,
                        last_edit_author: view.page.last_edit_author,
                        last_edit_time: view.page.last_edit_time,
                    })
                    .collect();
                RouteResponse::ok(json!({ "total": results.total, "pages": rows }))
            }
            Err(err) => RouteResponse::from_error(&err),
        }
    }

    /// `POST /draft-pages/revert`.
    pub fn revert(&self, actor: &Actor, body: &PageIdsBody) -> RouteResponse {
        self.transition(body, |lifecycle, ids| lifecycle.revert(actor, ids))
    }

    /// `POST /draft-pages/commit`.
    pub fn commit(&self, actor: &Actor, body: &PageIdsBody) -> RouteResponse {
        self.transition(body, |lifecycle, ids| lifecycle.commit(actor, ids))
    }

    fn transition(
        &self,
        body: &PageIdsBody,
        run: impl FnOnce(&DraftLifecycle<'a, R>, &[PageId]) -> DraftResult<BatchOutcome>,
    ) -> RouteResponse {
        let lifecycle = DraftLifecycle::new(self.repo, self.hooks);
        let outcome = body
            .page_ids()
            .and_then(|page_ids| run(&lifecycle, &page_ids));
        match outcome {
            Ok(_) => RouteResponse::ok(json!({ "success": true })),
            Err(err) => RouteResponse::from_error(&err),
        }
    }
}
