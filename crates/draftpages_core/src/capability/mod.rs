//! Capability gate consulted before reads and writes.
//!
//! # Responsibility
//! - Answer "can actor A perform operation O on page P?".
//! - Provide permission-scoping criteria for page queries.
//!
//! # Invariants
//! - Gates are pure: answers depend only on the actor and page passed in.

pub mod actor;
pub mod gate;
