//! SQLite bootstrap for the placement store.
//!
//! # Responsibility
//! - Open file or in-memory stores and bring their schema up to date
//!   before any branch data is touched.
//! - Distinguish transport failures from schema-compatibility failures.
//!
//! # Invariants
//! - `PRAGMA user_version` mirrors the applied migration version.
//! - A connection is handed out only once every migration has applied.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the placement store.
#[derive(Debug)]
pub enum DbError {
    /// SQLite transport or statement failure.
    Sqlite(rusqlite::Error),
    /// The store was written by a newer build and cannot be downgraded.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "placement store schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
