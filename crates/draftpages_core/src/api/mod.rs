//! Transport-agnostic handlers for the draft pages HTTP surface.
//!
//! # Responsibility
//! - Map route inputs onto overlay services.
//! - Produce `(status, JSON body)` responses for any HTTP layer to send.
//!
//! # Invariants
//! - Handlers never panic; every service error becomes a 500 response with
//!   an `error` payload.

pub mod draft_routes;
