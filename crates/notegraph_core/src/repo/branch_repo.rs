//! Branch repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for branch placements, including the position
//!   allocator queries used by sibling ordering.
//! - Keep SQL details and the atomic unit-of-work boundary inside the
//!   repository boundary.
//!
//! # Invariants
//! - Only active (`is_deleted=0`) branches participate in ordering,
//!   duplicate checks, and ancestry queries.
//! - `shift_positions` is a bulk range update and never touches
//!   `modified_at` of the shifted rows.
//! - Sibling listing is deterministic: `position ASC, branch_uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::branch::{Branch, BranchId, NoteId};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BRANCH_SELECT_SQL: &str = "SELECT
    branch_uuid,
    note_uuid,
    parent_uuid,
    position,
    is_expanded,
    modified_at,
    is_deleted
FROM branches";

/// Result type used by branch repository operations.
pub type BranchRepoResult<T> = Result<T, BranchRepoError>;

/// Errors from branch repository operations.
#[derive(Debug)]
pub enum BranchRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target branch does not exist or is soft-deleted.
    BranchNotFound(BranchId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for BranchRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::BranchNotFound(id) => write!(f, "branch not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "branch repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "branch repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "branch repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid branch data: {message}"),
        }
    }
}

impl Error for BranchRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for BranchRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BranchRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for branch placement persistence.
///
/// Mutating statements are single SQL statements; multi-statement mutations
/// are composed by callers inside [`BranchRepository::run_atomic`].
pub trait BranchRepository {
    /// Loads one branch by placement id.
    fn get_branch(
        &self,
        branch_uuid: BranchId,
        include_deleted: bool,
    ) -> BranchRepoResult<Option<Branch>>;
    /// Loads the active placement of one note under one parent, if any.
    fn find_active_placement(
        &self,
        note_uuid: NoteId,
        parent_uuid: Option<NoteId>,
    ) -> BranchRepoResult<Option<Branch>>;
    /// Lists branches under one parent ordered by `position, branch_uuid`.
    fn list_children(
        &self,
        parent_uuid: Option<NoteId>,
        include_deleted: bool,
    ) -> BranchRepoResult<Vec<Branch>>;
    /// Lists the distinct parents of all active placements of one note.
    ///
    /// A note cloned into several parents yields several entries; a root
    /// level placement yields `None`.
    fn distinct_active_parents(&self, note_uuid: NoteId) -> BranchRepoResult<Vec<Option<NoteId>>>;
    /// Computes the append position for one sibling group: one more than
    /// the maximum active position, or 0 for an empty group.
    fn next_append_position(&self, parent_uuid: Option<NoteId>) -> BranchRepoResult<i64>;
    /// Shifts active siblings of `parent_uuid` up by one position.
    ///
    /// With `include_anchor` the range is `position >= anchor_position`
    /// (make room *before* the anchor), otherwise `position > anchor_position`
    /// (make room *after* it). Returns the number of shifted rows. The
    /// shifted rows keep their `modified_at` untouched.
    fn shift_positions(
        &self,
        parent_uuid: Option<NoteId>,
        anchor_position: i64,
        include_anchor: bool,
    ) -> BranchRepoResult<usize>;
    /// Inserts one new branch row.
    fn insert_branch(&self, branch: &Branch) -> BranchRepoResult<()>;
    /// Re-parents and repositions one active branch, stamping `modified_at`.
    fn relocate_branch(
        &self,
        branch_uuid: BranchId,
        parent_uuid: Option<NoteId>,
        position: i64,
    ) -> BranchRepoResult<()>;
    /// Updates the expansion flag of one active branch.
    ///
    /// Deliberately leaves `modified_at` untouched: expansion state is local
    /// UI state and exempt from replication precedence.
    fn set_expanded(&self, branch_uuid: BranchId, is_expanded: bool) -> BranchRepoResult<()>;
    /// Runs `work` inside one IMMEDIATE transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back on
    /// any error, leaving no partial effect.
    fn run_atomic<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<BranchRepoError>,
        F: FnOnce() -> Result<T, E>;
}

/// SQLite-backed branch repository.
pub struct SqliteBranchRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBranchRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> BranchRepoResult<Self> {
        ensure_branch_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl BranchRepository for SqliteBranchRepository<'_> {
    fn get_branch(
        &self,
        branch_uuid: BranchId,
        include_deleted: bool,
    ) -> BranchRepoResult<Option<Branch>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BRANCH_SELECT_SQL}
             WHERE branch_uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;
        let mut rows = stmt.query(params![
            branch_uuid.to_string(),
            bool_to_int(include_deleted)
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_branch_row(row)?));
        }
        Ok(None)
    }

    fn find_active_placement(
        &self,
        note_uuid: NoteId,
        parent_uuid: Option<NoteId>,
    ) -> BranchRepoResult<Option<Branch>> {
        // `IS ?2` is SQLite's null-safe equality, so one statement covers
        // both root-level (NULL) and nested parents.
        let mut stmt = self.conn.prepare(&format!(
            "{BRANCH_SELECT_SQL}
             WHERE note_uuid = ?1
               AND parent_uuid IS ?2
               AND is_deleted = 0;"
        ))?;
        let mut rows = stmt.query(params![
            note_uuid.to_string(),
            parent_uuid.map(|value| value.to_string())
        ])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_branch_row(row)?));
        }
        Ok(None)
    }

    fn list_children(
        &self,
        parent_uuid: Option<NoteId>,
        include_deleted: bool,
    ) -> BranchRepoResult<Vec<Branch>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BRANCH_SELECT_SQL}
             WHERE parent_uuid IS ?1
               AND (?2 = 1 OR is_deleted = 0)
             ORDER BY position ASC, branch_uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![
            parent_uuid.map(|value| value.to_string()),
            bool_to_int(include_deleted)
        ])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_branch_row(row)?);
        }
        Ok(items)
    }

    fn distinct_active_parents(&self, note_uuid: NoteId) -> BranchRepoResult<Vec<Option<NoteId>>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT parent_uuid
             FROM branches
             WHERE note_uuid = ?1
               AND is_deleted = 0;",
        )?;
        let mut rows = stmt.query([note_uuid.to_string()])?;

        let mut parents = Vec::new();
        while let Some(row) = rows.next()? {
            let value: Option<String> = row.get(0)?;
            parents.push(
                value
                    .map(|text| parse_uuid(&text, "branches.parent_uuid"))
                    .transpose()?,
            );
        }
        Ok(parents)
    }

    fn next_append_position(&self, parent_uuid: Option<NoteId>) -> BranchRepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1
             FROM branches
             WHERE parent_uuid IS ?1
               AND is_deleted = 0;",
            params![parent_uuid.map(|value| value.to_string())],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn shift_positions(
        &self,
        parent_uuid: Option<NoteId>,
        anchor_position: i64,
        include_anchor: bool,
    ) -> BranchRepoResult<usize> {
        // Bulk range update, no renumbering pass: unaffected siblings keep
        // their rows untouched and produce no replication signal.
        let sql = if include_anchor {
            "UPDATE branches
             SET position = position + 1
             WHERE parent_uuid IS ?1
               AND is_deleted = 0
               AND position >= ?2;"
        } else {
            "UPDATE branches
             SET position = position + 1
             WHERE parent_uuid IS ?1
               AND is_deleted = 0
               AND position > ?2;"
        };
        let shifted = self.conn.execute(
            sql,
            params![
                parent_uuid.map(|value| value.to_string()),
                anchor_position
            ],
        )?;
        Ok(shifted)
    }

    fn insert_branch(&self, branch: &Branch) -> BranchRepoResult<()> {
        self.conn.execute(
            "INSERT INTO branches (
                branch_uuid,
                note_uuid,
                parent_uuid,
                position,
                is_expanded,
                is_deleted,
                modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                branch.branch_uuid.to_string(),
                branch.note_uuid.to_string(),
                branch.parent_uuid.map(|value| value.to_string()),
                branch.position,
                bool_to_int(branch.is_expanded),
                bool_to_int(branch.is_deleted),
                branch.modified_at,
            ],
        )?;
        Ok(())
    }

    fn relocate_branch(
        &self,
        branch_uuid: BranchId,
        parent_uuid: Option<NoteId>,
        position: i64,
    ) -> BranchRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE branches
             SET parent_uuid = ?2,
                 position = ?3,
                 modified_at = (strftime('%s', 'now') * 1000)
             WHERE branch_uuid = ?1
               AND is_deleted = 0;",
            params![
                branch_uuid.to_string(),
                parent_uuid.map(|value| value.to_string()),
                position,
            ],
        )?;
        if changed == 0 {
            return Err(BranchRepoError::BranchNotFound(branch_uuid));
        }
        Ok(())
    }

    fn set_expanded(&self, branch_uuid: BranchId, is_expanded: bool) -> BranchRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE branches
             SET is_expanded = ?2
             WHERE branch_uuid = ?1
               AND is_deleted = 0;",
            params![branch_uuid.to_string(), bool_to_int(is_expanded)],
        )?;
        if changed == 0 {
            return Err(BranchRepoError::BranchNotFound(branch_uuid));
        }
        Ok(())
    }

    fn run_atomic<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<BranchRepoError>,
        F: FnOnce() -> Result<T, E>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| E::from(BranchRepoError::from(err)))?;
        // Any statement on this connection while `tx` is open participates
        // in the transaction; dropping `tx` on the error path rolls back.
        let value = work()?;
        tx.commit().map_err(|err| E::from(BranchRepoError::from(err)))?;
        Ok(value)
    }
}

fn parse_branch_row(row: &Row<'_>) -> BranchRepoResult<Branch> {
    let branch_uuid_text: String = row.get("branch_uuid")?;
    let branch_uuid = parse_uuid(&branch_uuid_text, "branches.branch_uuid")?;

    let note_uuid_text: String = row.get("note_uuid")?;
    let note_uuid = parse_uuid(&note_uuid_text, "branches.note_uuid")?;

    let parent_uuid = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "branches.parent_uuid"))
        .transpose()?;

    Ok(Branch {
        branch_uuid,
        note_uuid,
        parent_uuid,
        position: row.get("position")?,
        is_expanded: int_to_bool(row.get("is_expanded")?, "branches.is_expanded")?,
        modified_at: row.get("modified_at")?,
        is_deleted: int_to_bool(row.get("is_deleted")?, "branches.is_deleted")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> BranchRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| BranchRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &'static str) -> BranchRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(BranchRepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn ensure_branch_connection_ready(conn: &Connection) -> BranchRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(BranchRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "branches")? {
        return Err(BranchRepoError::MissingRequiredTable("branches"));
    }

    for column in [
        "branch_uuid",
        "note_uuid",
        "parent_uuid",
        "position",
        "is_expanded",
        "is_deleted",
        "modified_at",
    ] {
        if !table_has_column(conn, "branches", column)? {
            return Err(BranchRepoError::MissingRequiredColumn {
                table: "branches",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> BranchRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> BranchRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
