//! Typed page filter expressions and their SQL compilation.
//!
//! # Responsibility
//! - Represent page filters as a closed expression tree instead of raw SQL.
//! - Compile filters into parameterized `WHERE` fragments.
//!
//! # Invariants
//! - Every user-supplied value is bound as a parameter, never interpolated.
//! - Late criteria are compiled outside the main conjunction.

use rusqlite::types::Value;

/// Queryable scalar page column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageField {
    Id,
    Slug,
    Title,
    SortTitle,
    PageType,
    SearchText,
    Published,
    Trash,
    Orphan,
    LastEditAuthor,
    LastEditTime,
    CreatedAt,
    UpdatedAt,
}

impl PageField {
    /// Qualified SQL column name.
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "pages.id",
            Self::Slug => "pages.slug",
            Self::Title => "pages.title",
            Self::SortTitle => "pages.sort_title",
            Self::PageType => "pages.page_type",
            Self::SearchText => "pages.search_text",
            Self::Published => "pages.published",
            Self::Trash => "pages.trash",
            Self::Orphan => "pages.orphan",
            Self::LastEditAuthor => "pages.last_edit_author",
            Self::LastEditTime => "pages.last_edit_time",
            Self::CreatedAt => "pages.created_at",
            Self::UpdatedAt => "pages.updated_at",
        }
    }

    /// Parses an external field name (`snake_case`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "slug" => Some(Self::Slug),
            "title" => Some(Self::Title),
            "sort_title" => Some(Self::SortTitle),
            "page_type" | "type" => Some(Self::PageType),
            "search_text" => Some(Self::SearchText),
            "published" => Some(Self::Published),
            "trash" => Some(Self::Trash),
            "orphan" => Some(Self::Orphan),
            "last_edit_author" => Some(Self::LastEditAuthor),
            "last_edit_time" => Some(Self::LastEditTime),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

/// Page filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Matches every page.
    Everything,
    /// Matches no page.
    Nothing,
    And(Vec<Criteria>),
    Or(Vec<Criteria>),
    Not(Box<Criteria>),
    Eq(PageField, Value),
    In(PageField, Vec<Value>),
    /// Boolean column is set.
    IsTrue(PageField),
    /// Column contains the given substring.
    Contains(PageField, String),
    /// Page carries at least one of the tags.
    TagsAny(Vec<String>),
    /// Page carries none of the tags.
    TagsNone(Vec<String>),
    /// Actor id is listed in the page-level editors.
    EditorsInclude(String),
    /// Page has a non-empty draft overlay.
    HasOverlay,
}

impl Criteria {
    /// Builds `field = value` for text values.
    pub fn eq_text(field: PageField, value: impl Into<String>) -> Self {
        Self::Eq(field, Value::Text(value.into()))
    }

    /// Builds `field IN (...)` for text values.
    pub fn in_text<I, S>(field: PageField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(
            field,
            values
                .into_iter()
                .map(|value| Value::Text(value.into()))
                .collect(),
        )
    }

    /// Appends this expression as SQL, pushing bind values in order.
    pub fn push_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::Everything => sql.push_str("1 = 1"),
            Self::Nothing => sql.push_str("1 = 0"),
            Self::And(parts) => push_joined(parts, " AND ", "1 = 1", sql, binds),
            Self::Or(parts) => push_joined(parts, " OR ", "1 = 0", sql, binds),
            Self::Not(inner) => {
                sql.push_str("NOT (");
                inner.push_sql(sql, binds);
                sql.push(')');
            }
            Self::Eq(field, value) => {
                sql.push_str(field.column());
                sql.push_str(" = ?");
                binds.push(value.clone());
            }
            Self::In(field, values) => {
                if values.is_empty() {
                    sql.push_str("1 = 0");
                    return;
                }
                sql.push_str(field.column());
                sql.push_str(" IN (");
                push_placeholders(values.len(), sql);
                sql.push(')');
                binds.extend(values.iter().cloned());
            }
            Self::IsTrue(field) => {
                sql.push_str(field.column());
                sql.push_str(" = 1");
            }
            Self::Contains(field, needle) => {
                sql.push_str("instr(");
                sql.push_str(field.column());
                sql.push_str(", ?) > 0");
                binds.push(Value::Text(needle.clone()));
            }
            Self::TagsAny(tags) => push_tag_membership(tags, false, sql, binds),
            Self::TagsNone(tags) => push_tag_membership(tags, true, sql, binds),
            Self::EditorsInclude(actor_id) => {
                sql.push_str(
                    "EXISTS (SELECT 1 FROM json_each(pages.editors) AS editor WHERE editor.value = ?)",
                );
                binds.push(Value::Text(actor_id.clone()));
            }
            Self::HasOverlay => {
                sql.push_str("EXISTS (SELECT 1 FROM json_each(pages.draft_areas))");
            }
        }
    }
}

/// Main conjunctive criteria plus late criteria kept outside of it.
///
/// Late criteria are attached beside the conjunction rather than nested in
/// it, so callers can add clauses that must stay at the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedCriteria {
    pub main: Criteria,
    pub late: Option<Criteria>,
}

impl ComposedCriteria {
    pub fn new(main: Criteria) -> Self {
        Self { main, late: None }
    }

    pub fn with_late(mut self, late: Option<Criteria>) -> Self {
        self.late = late;
        self
    }

    /// Compiles to a `WHERE` body and its bind values.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        sql.push('(');
        self.main.push_sql(&mut sql, &mut binds);
        sql.push(')');
        if let Some(late) = &self.late {
            sql.push_str(" AND (");
            late.push_sql(&mut sql, &mut binds);
            sql.push(')');
        }
        (sql, binds)
    }
}

impl From<Criteria> for ComposedCriteria {
    fn from(value: Criteria) -> Self {
        Self::new(value)
    }
}

fn push_joined(
    parts: &[Criteria],
    separator: &str,
    empty: &str,
    sql: &mut String,
    binds: &mut Vec<Value>,
) {
    if parts.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        part.push_sql(sql, binds);
    }
    sql.push(')');
}

fn push_placeholders(count: usize, sql: &mut String) {
    for index in 0..count {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
}

fn push_tag_membership(tags: &[String], negate: bool, sql: &mut String, binds: &mut Vec<Value>) {
    if tags.is_empty() {
        sql.push_str(if negate { "1 = 1" } else { "1 = 0" });
        return;
    }
    if negate {
        sql.push_str("NOT ");
    }
    sql.push_str("EXISTS (SELECT 1 FROM json_each(pages.tags) AS tag WHERE tag.value IN (");
    push_placeholders(tags.len(), sql);
    sql.push_str("))");
    binds.extend(tags.iter().map(|tag| Value::Text(tag.clone())));
}
