//! Draft overlay engine for region-based CMS pages.
//!
//! Pages keep a published (`areas`) and a draft (`draft_areas`) copy of their
//! regions. Editors read the merged view, write region drafts, and commit or
//! revert them in batches.

pub mod api;
pub mod capability;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::draft_routes::{DraftRoutes, ListDraftsParams, PageIdsBody, RouteResponse};
pub use capability::actor::{Actor, Role};
pub use capability::gate::{CapabilityGate, PageCapabilities, RoleCapabilityGate};
pub use config::{ConfigError, DraftPagesConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::page::{Page, PageId, RegionMap};
pub use model::region::{deep_merge, RegionAddress};
pub use repo::page_repo::{PageRepository, RepoError, RepoResult, SqlitePageRepository};
pub use repo::search_index::SqliteSearchIndexer;
pub use repo::version_repo::SqliteVersionRecorder;
pub use service::draft_lifecycle::{BatchOutcome, DraftLifecycle};
pub use service::loaders::{LoaderPolicy, RegionLoader, RegionLoaders};
pub use service::overlay_store::{OverlayRegionStore, RegionWrite};
pub use service::page_reader::{CompositePageReader, PageQueryOptions, PageResultSet, PageView};
pub use service::{DraftError, DraftResult, PageHooks, Versioning};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
