//! Core domain logic for the notegraph placement engine.
//! This crate is the single source of truth for tree mutation invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::branch::{Branch, BranchId, NoteId};
pub use repo::branch_repo::{
    BranchRepoError, BranchRepoResult, BranchRepository, SqliteBranchRepository,
};
pub use service::tree_service::{
    CloneOutcome, MoveOutcome, PlacementRejection, TreeService, TreeServiceError,
};
pub use sync::change_log::{
    ChangeKind, ChangeLog, ChangeLogError, ChangeRecord, SqliteChangeLog,
};

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
