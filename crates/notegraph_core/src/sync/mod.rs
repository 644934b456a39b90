//! Replication change journal.
//!
//! # Responsibility
//! - Record which branches and sibling groups changed, for downstream
//!   multi-device replication.
//!
//! # Invariants
//! - The journal keeps at most one row per changed entity.
//! - Records carry the originating device id so replication can avoid
//!   echoing a change back to its origin.

pub mod change_log;
