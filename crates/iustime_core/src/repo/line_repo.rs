//! Work line repository contract and SQLite implementation.
//!
//! # Invariants
//! - Listing order is creation order (`created_at ASC`, then insertion).
//! - Deleting a line cascades to its projects, tasks, risks and reviews,
//!   and is refused while users are still assigned to it.

use crate::model::{LineId, WorkLine};
use crate::repo::{
    ensure_connection_ready, is_constraint, not_found, parse_uuid, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::{ffi, params, Connection, Row};

const LINE_SELECT_SQL: &str = "SELECT id, name, description, created_at FROM work_lines";

pub trait LineRepository {
    fn create_line(&self, line: &WorkLine) -> RepoResult<LineId>;
    fn update_line(&self, line: &WorkLine) -> RepoResult<()>;
    fn get_line(&self, id: LineId) -> RepoResult<Option<WorkLine>>;
    fn list_lines(&self) -> RepoResult<Vec<WorkLine>>;
    fn delete_line(&self, id: LineId) -> RepoResult<()>;
}

pub struct SqliteLineRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLineRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["work_lines"])?;
        Ok(Self { conn })
    }
}

impl LineRepository for SqliteLineRepository<'_> {
    fn create_line(&self, line: &WorkLine) -> RepoResult<LineId> {
        line.validate()?;
        self.conn.execute(
            "INSERT INTO work_lines (id, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                line.id.to_string(),
                line.name.as_str(),
                line.description.as_str(),
                line.created_at,
            ],
        )?;
        Ok(line.id)
    }

    fn update_line(&self, line: &WorkLine) -> RepoResult<()> {
        line.validate()?;
        let changed = self.conn.execute(
            "UPDATE work_lines SET name = ?1, description = ?2 WHERE id = ?3;",
            params![
                line.name.as_str(),
                line.description.as_str(),
                line.id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(not_found(EntityKind::Line, line.id));
        }
        Ok(())
    }

    fn get_line(&self, id: LineId) -> RepoResult<Option<WorkLine>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LINE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_line_row(row)?));
        }
        Ok(None)
    }

    fn list_lines(&self) -> RepoResult<Vec<WorkLine>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LINE_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(parse_line_row(row)?);
        }
        Ok(lines)
    }

    fn delete_line(&self, id: LineId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM work_lines WHERE id = ?1;", [id.to_string()])
            .map_err(|err| {
                if is_constraint(&err, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                    RepoError::Conflict(format!("line {id} still has assigned users"))
                } else {
                    err.into()
                }
            })?;
        if changed == 0 {
            return Err(not_found(EntityKind::Line, id));
        }
        Ok(())
    }
}

fn parse_line_row(row: &Row<'_>) -> RepoResult<WorkLine> {
    let id_text: String = row.get("id")?;
    let line = WorkLine {
        id: parse_uuid(&id_text, "work_lines.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    };
    line.validate()?;
    Ok(line)
}
