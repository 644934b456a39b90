//! Branch domain model.
//!
//! # Responsibility
//! - Define one placement of a note under a parent note.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `branch_uuid` identifies the placement, not the note; one note may own
//!   many branches (one per parent it was cloned into).
//! - `parent_uuid == None` is the root level; the root has no branch of its
//!   own and can never be placed under another note.
//! - `is_deleted` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of one placement (branch) in the graph.
pub type BranchId = Uuid;

/// Stable identifier of the underlying note content object.
pub type NoteId = Uuid;

/// One edge in the note placement graph: "note is placed under parent".
///
/// Because cloning can place the same note under several parents, the active
/// placements form a DAG rather than a tree. Field names match the persisted
/// `branches` schema and are compatibility-relevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Stable placement id, distinct from the note's own identity.
    pub branch_uuid: BranchId,
    /// Identity of the placed note.
    pub note_uuid: NoteId,
    /// Containing note, or `None` for the root level.
    pub parent_uuid: Option<NoteId>,
    /// Ordering key among active siblings. Distinct per parent, not
    /// required to be contiguous.
    pub position: i64,
    /// UI expansion state. Excluded from replication.
    pub is_expanded: bool,
    /// Epoch ms marker used for conflict precedence during replication.
    /// Bumped only by structural mutations, never by sibling shifts.
    pub modified_at: i64,
    /// Soft delete tombstone preserved for replication history.
    pub is_deleted: bool,
}

impl Branch {
    /// Creates a new placement of `note_uuid` under `parent_uuid`.
    ///
    /// # Invariants
    /// - A fresh `branch_uuid` is generated; the note identity is reused.
    /// - New placements start collapsed and active.
    pub fn new_placement(note_uuid: NoteId, parent_uuid: Option<NoteId>, position: i64) -> Self {
        Self {
            branch_uuid: Uuid::new_v4(),
            note_uuid,
            parent_uuid,
            position,
            is_expanded: false,
            modified_at: now_epoch_ms(),
            is_deleted: false,
        }
    }

    /// Returns whether this branch sits at the root level.
    pub fn is_root_level(&self) -> bool {
        self.parent_uuid.is_none()
    }

    /// Returns whether this branch should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
