//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document-store contract the overlay engine wraps.
//! - Isolate SQLite query details from service orchestration.
//! - Provide the version-recording and indexing side-effect sinks.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateSlug`)
//!   in addition to DB transport errors.
//! - Nothing in this layer checks permissions.

pub mod criteria;
pub mod page_repo;
pub mod search_index;
pub mod version_repo;
