//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define one data access contract per entity.
//! - Keep SQL details out of service/business orchestration.
//!
//! # Invariants
//! - Write paths call the record's `validate()` before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories only accept connections migrated to the latest schema.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::os::raw::c_int;
use uuid::Uuid;

pub mod line_repo;
pub mod project_repo;
pub mod review_repo;
pub mod risk_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity family named in not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Line,
    Project,
    Task,
    Risk,
    User,
    ChecklistItem,
    Attachment,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Project => "project",
            Self::Task => "task",
            Self::Risk => "risk",
            Self::User => "user",
            Self::ChecklistItem => "checklist item",
            Self::Attachment => "attachment",
        }
    }
}

/// Error shared by every repository.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed `validate()`.
    Validation(ValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound { kind: EntityKind, id: Uuid },
    /// Write rejected by a uniqueness or reference constraint.
    Conflict(String),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Runs `f` atomically.
///
/// Opens a transaction when the connection is in autocommit mode; when the
/// caller already holds one (e.g. snapshot import), `f` joins it instead.
pub(crate) fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    run_atomically(conn, || f(conn))
}

/// Same as [`in_transaction`] for callers that reach the connection
/// through repositories and carry their own error type.
pub(crate) fn run_atomically<V, E>(
    conn: &Connection,
    f: impl FnOnce() -> Result<V, E>,
) -> Result<V, E>
where
    E: From<RepoError>,
{
    if !conn.is_autocommit() {
        return f();
    }
    let tx = conn.unchecked_transaction().map_err(RepoError::from)?;
    let value = f()?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

/// Verifies schema version and required tables before repository use.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
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

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|raw| parse_uuid(&raw, column)).transpose()
}

pub(crate) fn parse_enum<T>(
    value: &str,
    column: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value).ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_progress(value: i64, column: &'static str) -> RepoResult<u8> {
    u8::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid progress `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Whether `err` is the SQLite constraint failure with `extended_code`.
pub(crate) fn is_constraint(err: &rusqlite::Error, extended_code: c_int) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.extended_code == extended_code
    )
}

pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> RepoError {
    RepoError::NotFound { kind, id }
}

/// Maps a foreign-key failure on a line-scoped write to a missing line.
pub(crate) fn missing_line_on_fk(err: rusqlite::Error, line_id: Uuid) -> RepoError {
    if is_constraint(&err, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
        not_found(EntityKind::Line, line_id)
    } else {
        err.into()
    }
}
