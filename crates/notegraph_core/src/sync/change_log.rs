//! Change journal contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-branch and per-sibling-group change records into the
//!   `sync_changes` table.
//! - Expose the origin-filtered read path replication consumes.
//!
//! # Invariants
//! - Re-recording a change for the same entity replaces the previous row,
//!   keeping the journal minimal.
//! - `source_device_id` is opaque to the core; it only matters for origin
//!   suppression on the read path.

use crate::db::DbError;
use crate::model::branch::{BranchId, NoteId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by change journal operations.
pub type ChangeLogResult<T> = Result<T, ChangeLogError>;

/// Errors from change journal operations.
#[derive(Debug)]
pub enum ChangeLogError {
    /// Underlying SQLite error.
    Db(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for ChangeLogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid change record: {message}"),
        }
    }
}

impl Error for ChangeLogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for ChangeLogError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ChangeLogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Kind of recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// One branch changed structurally (parentage, position, existence).
    Branch,
    /// One sibling group's ordering changed as a side effect of an insert.
    BranchReordering,
}

/// One replication change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// Branch uuid for `Branch` records; sibling group parent uuid for
    /// `BranchReordering` records (`None` for the root group).
    pub entity_uuid: Option<Uuid>,
    /// Device that originated the change.
    pub source_device_id: String,
    /// Epoch ms the change was (last) recorded.
    pub recorded_at: i64,
}

/// Change journal interface consumed by mutation operations.
pub trait ChangeLog {
    /// Records a structural change for one branch.
    fn record_branch_change(
        &self,
        branch_uuid: BranchId,
        source_device_id: &str,
    ) -> ChangeLogResult<()>;
    /// Records an ordering change for one sibling group.
    fn record_reordering_change(
        &self,
        parent_uuid: Option<NoteId>,
        source_device_id: &str,
    ) -> ChangeLogResult<()>;
    /// Lists records relevant for one device, suppressing the rows that
    /// device originated itself.
    fn changes_for_device(&self, device_id: &str) -> ChangeLogResult<Vec<ChangeRecord>>;
}

/// SQLite-backed change journal over the `sync_changes` table.
pub struct SqliteChangeLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteChangeLog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn record(
        &self,
        kind: ChangeKind,
        entity_uuid: Option<Uuid>,
        source_device_id: &str,
    ) -> ChangeLogResult<()> {
        let entity_text = entity_uuid.map(|value| value.to_string());
        // Replace-by-entity: delete-then-insert instead of a unique index so
        // NULL entity ids (root sibling group) also dedupe.
        self.conn.execute(
            "DELETE FROM sync_changes
             WHERE kind = ?1
               AND entity_uuid IS ?2;",
            params![change_kind_to_db(kind), entity_text.as_deref()],
        )?;
        self.conn.execute(
            "INSERT INTO sync_changes (kind, entity_uuid, source_device_id)
             VALUES (?1, ?2, ?3);",
            params![
                change_kind_to_db(kind),
                entity_text.as_deref(),
                source_device_id
            ],
        )?;
        Ok(())
    }
}

impl ChangeLog for SqliteChangeLog<'_> {
    fn record_branch_change(
        &self,
        branch_uuid: BranchId,
        source_device_id: &str,
    ) -> ChangeLogResult<()> {
        self.record(ChangeKind::Branch, Some(branch_uuid), source_device_id)
    }

    fn record_reordering_change(
        &self,
        parent_uuid: Option<NoteId>,
        source_device_id: &str,
    ) -> ChangeLogResult<()> {
        self.record(ChangeKind::BranchReordering, parent_uuid, source_device_id)
    }

    fn changes_for_device(&self, device_id: &str) -> ChangeLogResult<Vec<ChangeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, entity_uuid, source_device_id, recorded_at
             FROM sync_changes
             WHERE source_device_id <> ?1
             ORDER BY recorded_at ASC, kind ASC, entity_uuid ASC;",
        )?;
        let mut rows = stmt.query([device_id])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_change_row(row)?);
        }
        Ok(records)
    }
}

fn parse_change_row(row: &Row<'_>) -> ChangeLogResult<ChangeRecord> {
    let kind_text: String = row.get("kind")?;
    let kind = parse_change_kind(&kind_text).ok_or_else(|| {
        ChangeLogError::InvalidData(format!(
            "invalid change kind `{kind_text}` in sync_changes.kind"
        ))
    })?;

    let entity_uuid = row
        .get::<_, Option<String>>("entity_uuid")?
        .map(|value| {
            Uuid::parse_str(&value).map_err(|_| {
                ChangeLogError::InvalidData(format!(
                    "invalid uuid `{value}` in sync_changes.entity_uuid"
                ))
            })
        })
        .transpose()?;

    Ok(ChangeRecord {
        kind,
        entity_uuid,
        source_device_id: row.get("source_device_id")?,
        recorded_at: row.get("recorded_at")?,
    })
}

fn change_kind_to_db(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Branch => "branch",
        ChangeKind::BranchReordering => "branch_reordering",
    }
}

fn parse_change_kind(value: &str) -> Option<ChangeKind> {
    match value {
        "branch" => Some(ChangeKind::Branch),
        "branch_reordering" => Some(ChangeKind::BranchReordering),
        _ => None,
    }
}
