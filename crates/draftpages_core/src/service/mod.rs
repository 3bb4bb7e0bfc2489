//! Overlay use-case services.
//!
//! # Responsibility
//! - Compose canonical and overlay content for reads (`page_reader`).
//! - Write overlay regions with race-safe page creation (`overlay_store`).
//! - Run permission-gated commit/revert batches (`draft_lifecycle`).
//!
//! # Invariants
//! - Services wrap a `PageRepository`; they never reach past it to SQL.
//! - Capability checks happen before the first mutation of a page.
//! - Errors abort the operation; applied per-page transitions are kept.

use crate::capability::gate::CapabilityGate;
use crate::model::region::MalformedRegionKey;
use crate::repo::page_repo::RepoError;
use crate::repo::search_index::PageIndexer;
use crate::repo::version_repo::PageVersionRecorder;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod draft_lifecycle;
pub mod loaders;
pub mod overlay_store;
pub mod page_reader;
pub mod page_writer;

use loaders::{LoaderError, RegionLoaders};

/// Result type for overlay services.
pub type DraftResult<T> = Result<T, DraftError>;

/// Service error for overlay reads, writes and batch transitions.
#[derive(Debug)]
pub enum DraftError {
    /// Region address is not a `slug:region` composite.
    MalformedKey(MalformedRegionKey),
    /// Capability check failed.
    PermissionDenied { actor: String, target: String },
    /// Target tree page does not exist.
    NotFound(String),
    /// Page id supplied by a caller is not a UUID.
    InvalidPageId(String),
    /// Store failure, surfaced without retry.
    Store(RepoError),
    /// Region loader failure.
    Loader(LoaderError),
}

impl DraftError {
    pub(crate) fn denied(actor: &str, target: impl Into<String>) -> Self {
        Self::PermissionDenied {
            actor: actor.to_string(),
            target: target.into(),
        }
    }

    /// Stable machine-readable code for logs and transport payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey(_) => "malformed_key",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::InvalidPageId(_) => "invalid_page_id",
            Self::Store(_) => "store_io",
            Self::Loader(_) => "loader_failed",
        }
    }
}

impl Display for DraftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedKey(err) => write!(f, "{err}"),
            Self::PermissionDenied { actor, target } => {
                write!(f, "permission denied: `{actor}` on `{target}`")
            }
            Self::NotFound(slug) => write!(f, "page not found: {slug}"),
            Self::InvalidPageId(value) => write!(f, "invalid page id: `{value}`"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Loader(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DraftError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedKey(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Loader(err) => Some(err),
            Self::PermissionDenied { .. } | Self::NotFound(_) | Self::InvalidPageId(_) => None,
        }
    }
}

impl From<RepoError> for DraftError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<MalformedRegionKey> for DraftError {
    fn from(value: MalformedRegionKey) -> Self {
        Self::MalformedKey(value)
    }
}

impl From<LoaderError> for DraftError {
    fn from(value: LoaderError) -> Self {
        Self::Loader(value)
    }
}

/// Whether a page write produces a version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Versioning {
    Record,
    Suppress,
}

/// Collaborators consulted around page reads and writes.
#[derive(Clone, Copy)]
pub struct PageHooks<'a> {
    pub gate: &'a dyn CapabilityGate,
    pub versions: &'a dyn PageVersionRecorder,
    pub indexer: &'a dyn PageIndexer,
    pub loaders: &'a RegionLoaders,
}
