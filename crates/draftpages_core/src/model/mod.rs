//! Page domain model for canonical and shadow region content.
//!
//! # Responsibility
//! - Define the page record that owns both canonical regions and the overlay.
//! - Provide region addressing and structural merge helpers.
//!
//! # Invariants
//! - Every page is identified by a stable `PageId` and a unique slug.
//! - An overlay with no entries is semantically absent.

pub mod page;
pub mod region;
