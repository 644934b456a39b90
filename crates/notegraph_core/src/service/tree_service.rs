//! Tree mutation engine over the branch placement graph.
//!
//! # Responsibility
//! - Relocate, reorder, and clone branches while preserving sibling
//!   ordering and rejecting cyclic or duplicate placements.
//! - Record the minimum replication change signal for every mutation.
//!
//! # Invariants
//! - Active siblings of one parent keep distinct positions.
//! - At most one active placement exists per (note, parent) pair.
//! - The active placement graph stays acyclic across all parents of a note.
//! - Sibling shifts never stamp `modified_at`; only the moved or cloned
//!   branch gets a fresh marker. Expansion toggles produce no change signal
//!   at all.

use crate::model::branch::{Branch, BranchId, NoteId};
use crate::repo::branch_repo::{BranchRepoError, BranchRepository};
use crate::sync::change_log::{ChangeLog, ChangeLogError};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from tree mutation operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// The branch to mutate does not exist or is soft-deleted.
    BranchNotFound(BranchId),
    /// The anchor branch of a relative insert does not exist.
    AnchorNotFound(BranchId),
    /// Repository-level failure; the atomic unit rolled back.
    Repo(BranchRepoError),
    /// Change journal failure; the atomic unit rolled back.
    ChangeLog(ChangeLogError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BranchNotFound(id) => write!(f, "branch not found: {id}"),
            Self::AnchorNotFound(id) => write!(f, "anchor branch not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::ChangeLog(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent tree state: {details}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::ChangeLog(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BranchRepoError> for TreeServiceError {
    fn from(value: BranchRepoError) -> Self {
        match value {
            BranchRepoError::BranchNotFound(branch_uuid) => Self::BranchNotFound(branch_uuid),
            other => Self::Repo(other),
        }
    }
}

impl From<ChangeLogError> for TreeServiceError {
    fn from(value: ChangeLogError) -> Self {
        Self::ChangeLog(value)
    }
}

/// Expected, recoverable reason a placement was refused.
///
/// Rejections are part of the success path: they describe user situations
/// (the note is already there, or would become its own ancestor), not
/// faults, so they are returned inside [`MoveOutcome`]/[`CloneOutcome`]
/// rather than as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRejection {
    /// The note already has an active placement under the target parent.
    DuplicatePlacement,
    /// The placement would make the note its own ancestor.
    WouldCreateCycle,
}

impl PlacementRejection {
    /// Human-readable message suitable for direct display to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::DuplicatePlacement => "This note already exists in the target parent note.",
            Self::WouldCreateCycle => "Placing the note here would create a cycle.",
        }
    }
}

impl Display for PlacementRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a move operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The branch was relocated; carries the refreshed read model.
    Moved(Branch),
    /// The move was refused for an expected, recoverable reason.
    Rejected(PlacementRejection),
}

/// Outcome of a clone operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    /// A new placement was created.
    Created(Branch),
    /// The clone was refused for an expected, recoverable reason.
    Rejected(PlacementRejection),
}

/// Tree mutation service facade.
///
/// Every mutation runs its validation reads, writes, and change records
/// inside one IMMEDIATE transaction. Reading inside the same transaction
/// that writes is what keeps two concurrent operations from both passing
/// the duplicate or cycle check, or from computing positions against a
/// stale anchor.
pub struct TreeService<R: BranchRepository, C: ChangeLog> {
    repo: R,
    changes: C,
}

impl<R: BranchRepository, C: ChangeLog> TreeService<R, C> {
    /// Creates the service from repository and change journal implementations.
    ///
    /// Both must operate on the same underlying store so the journal rows
    /// join the mutation's transaction.
    pub fn new(repo: R, changes: C) -> Self {
        Self { repo, changes }
    }

    /// Moves one branch to the end of `new_parent_uuid`'s children.
    ///
    /// Appends at `max(position) + 1`, stamps `modified_at`, and records a
    /// branch change for `source_device_id`.
    pub fn move_to_parent(
        &self,
        branch_uuid: BranchId,
        new_parent_uuid: Option<NoteId>,
        source_device_id: &str,
    ) -> Result<MoveOutcome, TreeServiceError> {
        self.repo.run_atomic(|| {
            let branch = self.require_branch(branch_uuid)?;
            if let Some(rejection) = self.check_move(&branch, new_parent_uuid)? {
                return Ok(MoveOutcome::Rejected(rejection));
            }

            let position = self.repo.next_append_position(new_parent_uuid)?;
            self.repo
                .relocate_branch(branch_uuid, new_parent_uuid, position)?;
            self.changes
                .record_branch_change(branch_uuid, source_device_id)?;
            Ok(MoveOutcome::Moved(self.reload_branch(branch_uuid)?))
        })
    }

    /// Moves one branch directly before `anchor_branch_uuid`.
    ///
    /// Siblings at or beyond the anchor position are shifted up by one
    /// without stamping their `modified_at`; the sibling group gets one
    /// reordering record and the moved branch one branch change record.
    pub fn move_before(
        &self,
        branch_uuid: BranchId,
        anchor_branch_uuid: BranchId,
        source_device_id: &str,
    ) -> Result<MoveOutcome, TreeServiceError> {
        self.move_relative(branch_uuid, anchor_branch_uuid, source_device_id, true)
    }

    /// Moves one branch directly after `anchor_branch_uuid`.
    ///
    /// Same side effects as [`TreeService::move_before`], shifting only the
    /// siblings strictly beyond the anchor.
    pub fn move_after(
        &self,
        branch_uuid: BranchId,
        anchor_branch_uuid: BranchId,
        source_device_id: &str,
    ) -> Result<MoveOutcome, TreeServiceError> {
        self.move_relative(branch_uuid, anchor_branch_uuid, source_device_id, false)
    }

    /// Clones one note to the end of `parent_uuid`'s children.
    ///
    /// Creates a fresh placement for an already-existing note. Duplicate
    /// placements and cycles are refused as recoverable rejections.
    pub fn clone_to_parent(
        &self,
        note_uuid: NoteId,
        parent_uuid: Option<NoteId>,
        source_device_id: &str,
    ) -> Result<CloneOutcome, TreeServiceError> {
        self.repo.run_atomic(|| {
            if let Some(rejection) = self.check_clone(note_uuid, parent_uuid)? {
                return Ok(CloneOutcome::Rejected(rejection));
            }

            let position = self.repo.next_append_position(parent_uuid)?;
            let branch = Branch::new_placement(note_uuid, parent_uuid, position);
            self.repo.insert_branch(&branch)?;
            self.changes
                .record_branch_change(branch.branch_uuid, source_device_id)?;
            Ok(CloneOutcome::Created(branch))
        })
    }

    /// Clones one note directly after `anchor_branch_uuid`.
    ///
    /// Combines the clone checks with the sibling shift of a relative
    /// insert: siblings strictly beyond the anchor move up by one, the
    /// group gets a reordering record, the new placement a branch record.
    pub fn clone_after(
        &self,
        note_uuid: NoteId,
        anchor_branch_uuid: BranchId,
        source_device_id: &str,
    ) -> Result<CloneOutcome, TreeServiceError> {
        self.repo.run_atomic(|| {
            let anchor = self
                .repo
                .get_branch(anchor_branch_uuid, false)?
                .ok_or(TreeServiceError::AnchorNotFound(anchor_branch_uuid))?;
            if let Some(rejection) = self.check_clone(note_uuid, anchor.parent_uuid)? {
                return Ok(CloneOutcome::Rejected(rejection));
            }

            self.repo
                .shift_positions(anchor.parent_uuid, anchor.position, false)?;
            self.changes
                .record_reordering_change(anchor.parent_uuid, source_device_id)?;
            let branch =
                Branch::new_placement(note_uuid, anchor.parent_uuid, anchor.position + 1);
            self.repo.insert_branch(&branch)?;
            self.changes
                .record_branch_change(branch.branch_uuid, source_device_id)?;
            Ok(CloneOutcome::Created(branch))
        })
    }

    /// Sets the expansion flag of one branch.
    ///
    /// Expansion is local UI state: no `modified_at` stamp, no sibling
    /// effect, and no change record.
    pub fn set_expanded(
        &self,
        branch_uuid: BranchId,
        is_expanded: bool,
    ) -> Result<(), TreeServiceError> {
        self.repo
            .set_expanded(branch_uuid, is_expanded)
            .map_err(Into::into)
    }

    fn move_relative(
        &self,
        branch_uuid: BranchId,
        anchor_branch_uuid: BranchId,
        source_device_id: &str,
        before_anchor: bool,
    ) -> Result<MoveOutcome, TreeServiceError> {
        self.repo.run_atomic(|| {
            let branch = self.require_branch(branch_uuid)?;
            let anchor = self
                .repo
                .get_branch(anchor_branch_uuid, false)?
                .ok_or(TreeServiceError::AnchorNotFound(anchor_branch_uuid))?;
            if let Some(rejection) = self.check_move(&branch, anchor.parent_uuid)? {
                return Ok(MoveOutcome::Rejected(rejection));
            }

            let target_position = if before_anchor {
                anchor.position
            } else {
                anchor.position + 1
            };

            // The moved branch may itself be shifted here when it already
            // sits in the anchor's group; the relocate below overwrites its
            // position, so the intermediate bump is harmless.
            self.repo
                .shift_positions(anchor.parent_uuid, anchor.position, before_anchor)?;
            self.changes
                .record_reordering_change(anchor.parent_uuid, source_device_id)?;
            self.repo
                .relocate_branch(branch_uuid, anchor.parent_uuid, target_position)?;
            self.changes
                .record_branch_change(branch_uuid, source_device_id)?;
            Ok(MoveOutcome::Moved(self.reload_branch(branch_uuid)?))
        })
    }

    fn require_branch(&self, branch_uuid: BranchId) -> Result<Branch, TreeServiceError> {
        self.repo
            .get_branch(branch_uuid, false)?
            .ok_or(TreeServiceError::BranchNotFound(branch_uuid))
    }

    fn reload_branch(&self, branch_uuid: BranchId) -> Result<Branch, TreeServiceError> {
        self.repo
            .get_branch(branch_uuid, false)?
            .ok_or(TreeServiceError::InconsistentState(
                "mutated branch not found in read-back",
            ))
    }

    fn check_move(
        &self,
        branch: &Branch,
        target_parent_uuid: Option<NoteId>,
    ) -> Result<Option<PlacementRejection>, TreeServiceError> {
        // A move carries an existing placement, so the placement under the
        // target parent that is the moved branch itself is not a duplicate.
        if let Some(existing) = self
            .repo
            .find_active_placement(branch.note_uuid, target_parent_uuid)?
        {
            if existing.branch_uuid != branch.branch_uuid {
                return Ok(Some(PlacementRejection::DuplicatePlacement));
            }
        }
        if self.would_create_cycle(target_parent_uuid, branch.note_uuid)? {
            return Ok(Some(PlacementRejection::WouldCreateCycle));
        }
        Ok(None)
    }

    fn check_clone(
        &self,
        note_uuid: NoteId,
        target_parent_uuid: Option<NoteId>,
    ) -> Result<Option<PlacementRejection>, TreeServiceError> {
        if self
            .repo
            .find_active_placement(note_uuid, target_parent_uuid)?
            .is_some()
        {
            return Ok(Some(PlacementRejection::DuplicatePlacement));
        }
        if self.would_create_cycle(target_parent_uuid, note_uuid)? {
            return Ok(Some(PlacementRejection::WouldCreateCycle));
        }
        Ok(None)
    }

    /// Returns whether placing `note_uuid` under `candidate_parent_uuid`
    /// would make the note its own ancestor.
    ///
    /// Because cloning gives a note several parents, every upward path from
    /// the candidate parent must be clear. The walk is strictly upward over
    /// active placements; the visited set keeps diamond ancestries from
    /// being traversed more than once.
    fn would_create_cycle(
        &self,
        candidate_parent_uuid: Option<NoteId>,
        note_uuid: NoteId,
    ) -> Result<bool, TreeServiceError> {
        let Some(candidate) = candidate_parent_uuid else {
            // The root is never anyone's descendant.
            return Ok(false);
        };
        let mut visited = HashSet::new();
        self.reaches_note(candidate, note_uuid, &mut visited)
    }

    fn reaches_note(
        &self,
        current: NoteId,
        note_uuid: NoteId,
        visited: &mut HashSet<NoteId>,
    ) -> Result<bool, TreeServiceError> {
        if current == note_uuid {
            return Ok(true);
        }
        if !visited.insert(current) {
            return Ok(false);
        }

        for parent in self.repo.distinct_active_parents(current)? {
            // A `None` parent means this path reached the root cleanly.
            if let Some(parent) = parent {
                if self.reaches_note(parent, note_uuid, visited)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
