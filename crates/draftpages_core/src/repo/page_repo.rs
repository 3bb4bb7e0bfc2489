//! Page repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the document-store primitives the overlay engine builds on:
//!   projected find, count, distinct, conditional overlay update,
//!   insert-without-retry and replace-by-id.
//! - Keep SQL and JSON column encoding inside the persistence boundary.
//!
//! # Invariants
//! - An empty overlay is persisted as `NULL`.
//! - `set_overlay_region` touches one row with one statement.
//! - `insert_page` never retries; a slug collision surfaces as
//!   `RepoError::DuplicateSlug`.

use crate::db::DbError;
use crate::model::page::{Page, PageId, RegionMap};
use crate::repo::criteria::{ComposedCriteria, Criteria, PageField};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for page persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Replace-by-id matched no row.
    NotFound(PageId),
    /// No page carries this slug.
    SlugNotFound(String),
    /// Insert lost against an existing page with the same slug.
    DuplicateSlug(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "page not found: {id}"),
            Self::SlugNotFound(slug) => write!(f, "page slug not found: {slug}"),
            Self::DuplicateSlug(slug) => write!(f, "page slug already exists: {slug}"),
            Self::InvalidData(message) => write!(f, "invalid persisted page data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::SlugNotFound(_)
            | Self::DuplicateSlug(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which region keys a fetch loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegionProjection {
    #[default]
    All,
    /// Neither canonical regions nor the overlay are loaded.
    Exclude,
    /// Only these keys, from canonical regions and the overlay alike.
    Only(BTreeSet<String>),
}

/// Column selection for page fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Load only identity and permission columns.
    pub identity_only: bool,
    pub regions: RegionProjection,
}

impl Projection {
    /// Every column and every region.
    pub fn full() -> Self {
        Self::default()
    }

    /// Identity and permission columns only; no regions.
    pub fn identity() -> Self {
        Self {
            identity_only: true,
            regions: RegionProjection::Exclude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: PageField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: PageField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: PageField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }
}

/// One projected, sorted, paginated page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFind {
    pub criteria: ComposedCriteria,
    pub projection: Projection,
    /// Empty means store order.
    pub sort: Vec<SortKey>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl PageFind {
    pub fn new(criteria: impl Into<ComposedCriteria>) -> Self {
        Self {
            criteria: criteria.into(),
            projection: Projection::full(),
            sort: Vec::new(),
            skip: None,
            limit: None,
        }
    }
}

/// Repository interface over the canonical page store.
pub trait PageRepository {
    /// Fetches pages matching `find`.
    fn find_pages(&self, find: &PageFind) -> RepoResult<Vec<Page>>;
    /// Counts pages matching `criteria`, ignoring pagination.
    fn count_pages(&self, criteria: &ComposedCriteria) -> RepoResult<u64>;
    /// Distinct values of one column among matching pages.
    fn distinct_values(
        &self,
        field: PageField,
        criteria: &ComposedCriteria,
    ) -> RepoResult<Vec<JsonValue>>;
    /// Distinct tags carried by matching pages, sorted.
    fn distinct_tags(&self, criteria: &ComposedCriteria) -> RepoResult<Vec<String>>;
    /// Sets one overlay region on the page with `slug`.
    ///
    /// Returns the number of matched pages (`0` when the slug is unknown).
    fn set_overlay_region(
        &self,
        slug: &str,
        region_key: &str,
        content: &JsonValue,
        author: &str,
        edited_at: i64,
    ) -> RepoResult<usize>;
    /// Inserts a new page exactly once.
    fn insert_page(&self, page: &Page) -> RepoResult<PageId>;
    /// Replaces every stored column of an existing page.
    fn replace_page(&self, page: &Page) -> RepoResult<()>;

    /// Loads pages by id, ignoring permission scoping, in the order given.
    ///
    /// Ids without a stored page are skipped.
    fn find_by_ids(&self, ids: &[PageId]) -> RepoResult<Vec<Page>> {
        let criteria = Criteria::in_text(PageField::Id, ids.iter().map(Uuid::to_string));
        let mut pages = self.find_pages(&PageFind::new(criteria))?;
        pages.sort_by_key(|page| ids.iter().position(|id| *id == page.id));
        Ok(pages)
    }

    /// Loads one page by slug, ignoring permission scoping.
    fn find_by_slug(&self, slug: &str, projection: &Projection) -> RepoResult<Option<Page>> {
        let mut find = PageFind::new(Criteria::eq_text(PageField::Slug, slug));
        find.projection = projection.clone();
        find.limit = Some(1);
        Ok(self.find_pages(&find)?.into_iter().next())
    }
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn find_pages(&self, find: &PageFind) -> RepoResult<Vec<Page>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let mut sql = select_clause(&find.projection, &mut bind_values);
        let (where_sql, where_binds) = find.criteria.to_sql();
        sql.push_str(" FROM pages WHERE ");
        sql.push_str(&where_sql);
        bind_values.extend(where_binds);

        if !find.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            for (index, key) in find.sort.iter().enumerate() {
                if index > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(key.field.column());
                sql.push_str(match key.order {
                    SortOrder::Asc => " ASC",
                    SortOrder::Desc => " DESC",
                });
            }
            sql.push_str(", pages.id ASC");
        }

        if let Some(limit) = find.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if let Some(skip) = find.skip.filter(|skip| *skip > 0) {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(skip)));
            }
        } else if let Some(skip) = find.skip.filter(|skip| *skip > 0) {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(skip)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }
        Ok(pages)
    }

    fn count_pages(&self, criteria: &ComposedCriteria) -> RepoResult<u64> {
        let (where_sql, binds) = criteria.to_sql();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM pages WHERE {where_sql};"),
            params_from_iter(binds),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative page count {count}")))
    }

    fn distinct_values(
        &self,
        field: PageField,
        criteria: &ComposedCriteria,
    ) -> RepoResult<Vec<JsonValue>> {
        let (where_sql, binds) = criteria.to_sql();
        let column = field.column();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM pages WHERE {where_sql} ORDER BY {column} ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(sql_value_to_json(field, row.get(0)?));
        }
        Ok(values)
    }

    fn distinct_tags(&self, criteria: &ComposedCriteria) -> RepoResult<Vec<String>> {
        let (where_sql, binds) = criteria.to_sql();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT page_tag.value
             FROM pages, json_each(pages.tags) AS page_tag
             WHERE {where_sql}
             ORDER BY page_tag.value ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get(0)?);
        }
        Ok(tags)
    }

    fn set_overlay_region(
        &self,
        slug: &str,
        region_key: &str,
        content: &JsonValue,
        author: &str,
        edited_at: i64,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE pages
             SET
                draft_areas = json_set(COALESCE(draft_areas, '{}'), ?1, json(?2)),
                last_edit_author = ?3,
                last_edit_time = ?4
             WHERE slug = ?5;",
            params![
                format!("$.{region_key}"),
                encode_json(content)?,
                author,
                edited_at,
                slug,
            ],
        )?;
        Ok(changed)
    }

    fn insert_page(&self, page: &Page) -> RepoResult<PageId> {
        let result = self.conn.execute(
            "INSERT INTO pages (
                id,
                slug,
                title,
                sort_title,
                page_type,
                tags,
                areas,
                draft_areas,
                editors,
                props,
                search_text,
                published,
                trash,
                orphan,
                last_edit_author,
                last_edit_time,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18);",
            params![
                page.id.to_string(),
                page.slug.as_str(),
                page.title.as_str(),
                page.sort_title.as_str(),
                page.page_type.as_deref(),
                encode_json(&page.tags)?,
                encode_json(&page.areas)?,
                encode_overlay(page)?,
                encode_json(&page.editors)?,
                encode_json(&page.props)?,
                page.search_text.as_str(),
                page.published,
                page.trash,
                page.orphan,
                page.last_edit_author.as_deref(),
                page.last_edit_time,
                page.created_at,
                page.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(page.id),
            Err(err) if is_unique_violation(&err) => Err(RepoError::DuplicateSlug(page.slug.clone())),
            Err(err) => Err(err.into()),
        }
    }

    fn replace_page(&self, page: &Page) -> RepoResult<()> {
        let result = self.conn.execute(
            "UPDATE pages
             SET
                slug = ?2,
                title = ?3,
                sort_title = ?4,
                page_type = ?5,
                tags = ?6,
                areas = ?7,
                draft_areas = ?8,
                editors = ?9,
                props = ?10,
                search_text = ?11,
                published = ?12,
                trash = ?13,
                orphan = ?14,
                last_edit_author = ?15,
                last_edit_time = ?16,
                updated_at = ?17
             WHERE id = ?1;",
            params![
                page.id.to_string(),
                page.slug.as_str(),
                page.title.as_str(),
                page.sort_title.as_str(),
                page.page_type.as_deref(),
                encode_json(&page.tags)?,
                encode_json(&page.areas)?,
                encode_overlay(page)?,
                encode_json(&page.editors)?,
                encode_json(&page.props)?,
                page.search_text.as_str(),
                page.published,
                page.trash,
                page.orphan,
                page.last_edit_author.as_deref(),
                page.last_edit_time,
                page.updated_at,
            ],
        );

        let changed = match result {
            Ok(changed) => changed,
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::DuplicateSlug(page.slug.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        if changed == 0 {
            return Err(RepoError::NotFound(page.id));
        }
        Ok(())
    }
}

const IDENTITY_COLUMNS: &[&str] = &["id", "slug", "published", "trash", "orphan", "editors"];

/// Detail columns paired with the placeholder used when not projected.
const DETAIL_COLUMNS: &[(&str, &str)] = &[
    ("title", "''"),
    ("sort_title", "''"),
    ("page_type", "NULL"),
    ("tags", "'[]'"),
    ("props", "'{}'"),
    ("search_text", "''"),
    ("last_edit_author", "NULL"),
    ("last_edit_time", "NULL"),
    ("created_at", "0"),
    ("updated_at", "0"),
];

fn select_clause(projection: &Projection, binds: &mut Vec<Value>) -> String {
    let mut columns: Vec<String> = IDENTITY_COLUMNS
        .iter()
        .map(|column| format!("pages.{column} AS {column}"))
        .collect();

    for (column, placeholder) in DETAIL_COLUMNS {
        if projection.identity_only {
            columns.push(format!("{placeholder} AS {column}"));
        } else {
            columns.push(format!("pages.{column} AS {column}"));
        }
    }

    let regions = if projection.identity_only {
        &RegionProjection::Exclude
    } else {
        &projection.regions
    };
    match regions {
        RegionProjection::All => {
            columns.push("pages.areas AS areas".to_string());
            columns.push("pages.draft_areas AS draft_areas".to_string());
        }
        RegionProjection::Exclude => {
            columns.push("'{}' AS areas".to_string());
            columns.push("NULL AS draft_areas".to_string());
        }
        RegionProjection::Only(keys) => {
            let placeholders = vec!["?"; keys.len()].join(", ");
            let filter = if keys.is_empty() {
                "0".to_string()
            } else {
                format!("region.key IN ({placeholders})")
            };
            columns.push(format!(
                "(SELECT COALESCE(json_group_object(region.key, region.value), '{{}}')
                  FROM json_each(pages.areas) AS region
                  WHERE {filter}) AS areas"
            ));
            columns.push(format!(
                "(SELECT CASE WHEN COUNT(*) = 0 THEN NULL
                         ELSE json_group_object(region.key, region.value) END
                  FROM json_each(pages.draft_areas) AS region
                  WHERE {filter}) AS draft_areas"
            ));
            for _ in 0..2 {
                binds.extend(keys.iter().map(|key| Value::Text(key.clone())));
            }
        }
    }

    format!("SELECT {}", columns.join(", "))
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<Page> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in pages.id"))
    })?;

    let draft_areas = match row.get::<_, Option<String>>("draft_areas")? {
        Some(text) => {
            let overlay: RegionMap = decode_json(&text, "draft_areas")?;
            Some(overlay).filter(|overlay| !overlay.is_empty())
        }
        None => None,
    };

    Ok(Page {
        id,
        slug: row.get("slug")?,
        title: row.get("title")?,
        sort_title: row.get("sort_title")?,
        page_type: row.get("page_type")?,
        tags: decode_json(&row.get::<_, String>("tags")?, "tags")?,
        areas: decode_json(&row.get::<_, String>("areas")?, "areas")?,
        draft_areas,
        editors: decode_json(&row.get::<_, String>("editors")?, "editors")?,
        props: decode_json(&row.get::<_, String>("props")?, "props")?,
        search_text: row.get("search_text")?,
        published: parse_flag(row.get("published")?, "published")?,
        trash: parse_flag(row.get("trash")?, "trash")?,
        orphan: parse_flag(row.get("orphan")?, "orphan")?,
        last_edit_author: row.get("last_edit_author")?,
        last_edit_time: row.get("last_edit_time")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in pages.{column}"
        ))),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(text: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid JSON in pages.{column}: {err}")))
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("failed to encode JSON column: {err}")))
}

fn encode_overlay(page: &Page) -> RepoResult<Option<String>> {
    page.overlay().map(encode_json).transpose()
}

fn sql_value_to_json(field: PageField, value: Value) -> JsonValue {
    match (field, value) {
        (_, Value::Null) => JsonValue::Null,
        (PageField::Published | PageField::Trash | PageField::Orphan, Value::Integer(flag)) => {
            JsonValue::Bool(flag != 0)
        }
        (_, Value::Integer(number)) => JsonValue::from(number),
        (_, Value::Real(number)) => JsonValue::from(number),
        (_, Value::Text(text)) => JsonValue::String(text),
        (_, Value::Blob(bytes)) => JsonValue::from(bytes),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
