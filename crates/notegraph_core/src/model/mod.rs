//! Domain model for the note placement graph.
//!
//! # Responsibility
//! - Define the canonical branch record shared by repository and service
//!   layers.
//!
//! # Invariants
//! - Notes and branches carry identity-distinct stable UUIDs.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod branch;
