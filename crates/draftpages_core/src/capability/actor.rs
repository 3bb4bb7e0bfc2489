//! Acting user identity.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse permission role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees published pages only.
    Guest,
    /// Edits pages that list the actor as an editor.
    Contributor,
    /// Edits every page.
    Editor,
    /// Edits and commits every page.
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Contributor => "contributor",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Result<Self, UnknownRole> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "contributor" => Ok(Self::Contributor),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl Display for UnknownRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown role `{}`; expected guest|contributor|editor|admin",
            self.0
        )
    }
}

impl Error for UnknownRole {}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identity recorded as last editor and version author.
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Anonymous visitor.
    pub fn guest() -> Self {
        Self::new("anonymous", Role::Guest)
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, UnknownRole};

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!(Role::parse(" Admin "), Ok(Role::Admin));
        assert_eq!(Role::parse("contributor"), Ok(Role::Contributor));
        assert_eq!(Role::parse("root"), Err(UnknownRole("root".to_string())));
    }
}
