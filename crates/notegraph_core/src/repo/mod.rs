//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for branch placements.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`BranchNotFound`) in addition
//!   to DB transport errors.
//! - Multi-statement mutations run inside the repository's atomic
//!   unit-of-work boundary.

pub mod branch_repo;
