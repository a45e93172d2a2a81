//! Project repository contract and SQLite implementation.
//!
//! # Invariants
//! - Listing order is insertion order.
//! - `next_steps` is persisted as a JSON array of strings.
//! - Deleting a project cascades to its tasks.

use crate::model::{Level, LineId, Project, ProjectId, WorkStatus};
use crate::repo::{
    bool_to_int, ensure_connection_ready, missing_line_on_fk, not_found, parse_enum, parse_flag,
    parse_progress, parse_uuid, EntityKind, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    line_id,
    name,
    objective,
    assignee,
    start_date,
    end_date,
    status,
    priority,
    difficulty,
    next_steps,
    notes,
    budget,
    progress,
    auto_progress
FROM projects";

/// Filter options for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectListQuery {
    pub line_id: Option<LineId>,
}

impl ProjectListQuery {
    pub fn for_line(line_id: LineId) -> Self {
        Self {
            line_id: Some(line_id),
        }
    }
}

pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
    /// Overwrites only the progress column.
    fn set_progress(&self, id: ProjectId, progress: u8) -> RepoResult<()>;
}

pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects"])?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;
        self.conn
            .execute(
                "INSERT INTO projects (
                    id,
                    line_id,
                    name,
                    objective,
                    assignee,
                    start_date,
                    end_date,
                    status,
                    priority,
                    difficulty,
                    next_steps,
                    notes,
                    budget,
                    progress,
                    auto_progress
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
                params![
                    project.id.to_string(),
                    project.line_id.to_string(),
                    project.name.as_str(),
                    project.objective.as_str(),
                    project.assignee.as_str(),
                    project.start_date,
                    project.end_date,
                    project.status.as_str(),
                    project.priority.as_str(),
                    project.difficulty.as_str(),
                    encode_steps(&project.next_steps)?,
                    project.notes.as_str(),
                    project.budget,
                    i64::from(project.progress),
                    bool_to_int(project.auto_progress),
                ],
            )
            .map_err(|err| missing_line_on_fk(err, project.line_id))?;
        Ok(project.id)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE projects
                 SET
                    line_id = ?1,
                    name = ?2,
                    objective = ?3,
                    assignee = ?4,
                    start_date = ?5,
                    end_date = ?6,
                    status = ?7,
                    priority = ?8,
                    difficulty = ?9,
                    next_steps = ?10,
                    notes = ?11,
                    budget = ?12,
                    progress = ?13,
                    auto_progress = ?14,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?15;",
                params![
                    project.line_id.to_string(),
                    project.name.as_str(),
                    project.objective.as_str(),
                    project.assignee.as_str(),
                    project.start_date,
                    project.end_date,
                    project.status.as_str(),
                    project.priority.as_str(),
                    project.difficulty.as_str(),
                    encode_steps(&project.next_steps)?,
                    project.notes.as_str(),
                    project.budget,
                    i64::from(project.progress),
                    bool_to_int(project.auto_progress),
                    project.id.to_string(),
                ],
            )
            .map_err(|err| missing_line_on_fk(err, project.line_id))?;
        if changed == 0 {
            return Err(not_found(EntityKind::Project, project.id));
        }
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(line_id) = query.line_id {
            sql.push_str(" AND line_id = ?");
            bind_values.push(Value::Text(line_id.to_string()));
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(EntityKind::Project, id));
        }
        Ok(())
    }

    fn set_progress(&self, id: ProjectId, progress: u8) -> RepoResult<()> {
        if progress > 100 {
            return Err(crate::model::ValidationError::ProgressOutOfRange(progress).into());
        }
        let changed = self.conn.execute(
            "UPDATE projects
             SET progress = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![i64::from(progress), id.to_string()],
        )?;
        if changed == 0 {
            return Err(not_found(EntityKind::Project, id));
        }
        Ok(())
    }
}

fn encode_steps(steps: &[String]) -> RepoResult<String> {
    serde_json::to_string(steps)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode next_steps: {err}")))
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let line_text: String = row.get("line_id")?;
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let difficulty_text: String = row.get("difficulty")?;
    let steps_text: String = row.get("next_steps")?;
    let next_steps: Vec<String> = serde_json::from_str(&steps_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid next_steps `{steps_text}` in projects.next_steps"
        ))
    })?;

    let project = Project {
        id: parse_uuid(&id_text, "projects.id")?,
        line_id: parse_uuid(&line_text, "projects.line_id")?,
        name: row.get("name")?,
        objective: row.get("objective")?,
        assignee: row.get("assignee")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        status: parse_enum(&status_text, "projects.status", WorkStatus::parse)?,
        priority: parse_enum(&priority_text, "projects.priority", Level::parse)?,
        difficulty: parse_enum(&difficulty_text, "projects.difficulty", Level::parse)?,
        next_steps,
        notes: row.get("notes")?,
        budget: row.get("budget")?,
        progress: parse_progress(row.get("progress")?, "projects.progress")?,
        auto_progress: parse_flag(row.get("auto_progress")?, "projects.auto_progress")?,
    };
    project.validate()?;
    Ok(project)
}
