//! Whole-workspace JSON export and import.
//!
//! # Responsibility
//! - Capture every line-scoped record plus reviews as one document.
//! - Replace the stored domain data with a document atomically.
//!
//! # Invariants
//! - Users and password hashes never appear in a snapshot and survive an
//!   import untouched.
//! - An import either applies completely or leaves the database unchanged.
//! - Every reference inside a snapshot resolves within the same snapshot.
//! - A risk links only to a task of its own line.
//! - Imported auto-progress projects hold the roll-up of their imported
//!   top-level tasks, whatever progress the document carries.

use crate::model::{
    now_epoch_ms, GlobalReview, LineId, MonthlyReview, Project, Risk, Task, ValidationError,
    WorkLine,
};
use crate::repo::line_repo::{LineRepository, SqliteLineRepository};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
use crate::repo::review_repo::{ReviewRepository, SqliteReviewRepository};
use crate::repo::risk_repo::{RiskListQuery, RiskRepository, SqliteRiskRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{EntityKind, RepoError};
use crate::service::task_service::rollup_progress;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    /// Unix epoch milliseconds.
    pub exported_at: i64,
    #[serde(default)]
    pub lines: Vec<WorkLine>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub monthly_reviews: Vec<MonthlyReview>,
    #[serde(default)]
    pub global_reviews: Vec<GlobalReview>,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Json)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(text).map_err(SnapshotError::Json)
    }
}

#[derive(Debug)]
pub enum SnapshotError {
    UnsupportedVersion { found: u32, supported: u32 },
    Validation(ValidationError),
    /// A record points at `kind`/`id`, which the snapshot does not contain.
    DanglingReference { kind: EntityKind, id: Uuid },
    /// A subtask is nested under another subtask or another project's task.
    NestedSubtask(Uuid),
    /// A task's line differs from its project's line.
    LineMismatch(Uuid),
    /// A risk links to a task of another line.
    RiskLineMismatch(Uuid),
    /// The same id appears twice for one record kind.
    DuplicateId { kind: EntityKind, id: Uuid },
    /// An existing user is assigned to a line the snapshot drops.
    AssignedLineMissing(LineId),
    Json(serde_json::Error),
    Repo(RepoError),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "snapshot version {found} is not supported (expected {supported})"
            ),
            Self::Validation(err) => write!(f, "invalid snapshot record: {err}"),
            Self::DanglingReference { kind, id } => {
                write!(f, "snapshot references missing {} {id}", kind.as_str())
            }
            Self::NestedSubtask(id) => write!(f, "task {id} has an invalid parent"),
            Self::LineMismatch(id) => write!(f, "task {id} is not in its project's line"),
            Self::RiskLineMismatch(id) => write!(f, "risk {id} links a task of another line"),
            Self::DuplicateId { kind, id } => {
                write!(f, "duplicate {} id {id} in snapshot", kind.as_str())
            }
            Self::AssignedLineMissing(line_id) => write!(
                f,
                "line {line_id} has assigned users and must be part of the snapshot"
            ),
            Self::Json(err) => write!(f, "snapshot json error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SnapshotError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for SnapshotError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<ValidationError> for SnapshotError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Reads every domain record, users excluded.
pub fn export_snapshot(conn: &Connection) -> Result<StateSnapshot, SnapshotError> {
    let snapshot = StateSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: now_epoch_ms(),
        lines: SqliteLineRepository::try_new(conn)?.list_lines()?,
        projects: SqliteProjectRepository::try_new(conn)?
            .list_projects(&ProjectListQuery::default())?,
        tasks: SqliteTaskRepository::try_new(conn)?.list_tasks(&TaskListQuery::default())?,
        risks: SqliteRiskRepository::try_new(conn)?.list_risks(&RiskListQuery::default())?,
        monthly_reviews: SqliteReviewRepository::try_new(conn)?.list_monthly_reviews(None)?,
        global_reviews: SqliteReviewRepository::try_new(conn)?.list_global_reviews()?,
    };
    log::info!(
        "event=snapshot_export module=snapshot status=ok lines={} projects={} tasks={} risks={}",
        snapshot.lines.len(),
        snapshot.projects.len(),
        snapshot.tasks.len(),
        snapshot.risks.len()
    );
    Ok(snapshot)
}

/// Replaces all domain data with `snapshot` in one transaction.
pub fn import_snapshot(conn: &Connection, snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    check_references(snapshot)?;

    let kept_lines: HashSet<LineId> = snapshot.lines.iter().map(|line| line.id).collect();
    for user in SqliteUserRepository::try_new(conn)?.list_users()? {
        if let Some(line_id) = user.assigned_line_id {
            if !kept_lines.contains(&line_id) {
                return Err(SnapshotError::AssignedLineMissing(line_id));
            }
        }
    }

    let tx = conn.unchecked_transaction()?;
    let result = replace_contents(&tx, snapshot, &kept_lines);
    match result {
        Ok(()) => {
            tx.commit()?;
            log::info!(
                "event=snapshot_import module=snapshot status=ok lines={} projects={} tasks={} risks={}",
                snapshot.lines.len(),
                snapshot.projects.len(),
                snapshot.tasks.len(),
                snapshot.risks.len()
            );
            Ok(())
        }
        Err(err) => {
            log::warn!("event=snapshot_import module=snapshot status=error");
            Err(err)
        }
    }
}

fn replace_contents(
    conn: &Connection,
    snapshot: &StateSnapshot,
    kept_lines: &HashSet<LineId>,
) -> Result<(), SnapshotError> {
    conn.execute_batch(
        "DELETE FROM risks;
         DELETE FROM tasks;
         DELETE FROM projects;
         DELETE FROM monthly_reviews;
         DELETE FROM global_reviews;",
    )?;

    let lines = SqliteLineRepository::try_new(conn)?;
    for existing in lines.list_lines()? {
        if !kept_lines.contains(&existing.id) {
            lines.delete_line(existing.id)?;
        }
    }
    // Upsert keeps lines that users point at in place.
    for line in &snapshot.lines {
        line.validate()?;
        conn.execute(
            "INSERT INTO work_lines (id, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                created_at = excluded.created_at;",
            params![
                line.id.to_string(),
                line.name.as_str(),
                line.description.as_str(),
                line.created_at,
            ],
        )?;
    }

    let projects = SqliteProjectRepository::try_new(conn)?;
    for project in &snapshot.projects {
        projects.create_project(project)?;
    }

    let tasks = SqliteTaskRepository::try_new(conn)?;
    let (top_level, subtasks): (Vec<&Task>, Vec<&Task>) =
        snapshot.tasks.iter().partition(|task| !task.is_subtask());
    for task in top_level.into_iter().chain(subtasks) {
        tasks.create_task(task)?;
    }
    for project in snapshot.projects.iter().filter(|project| project.auto_progress) {
        let top_level = tasks.list_tasks(&TaskListQuery::top_level_of(project.id))?;
        let progress = rollup_progress(&top_level);
        if progress != project.progress {
            projects.set_progress(project.id, progress)?;
        }
    }

    let risks = SqliteRiskRepository::try_new(conn)?;
    for risk in &snapshot.risks {
        risks.create_risk(risk)?;
    }

    let reviews = SqliteReviewRepository::try_new(conn)?;
    for review in &snapshot.monthly_reviews {
        reviews.upsert_monthly_review(review)?;
    }
    for review in &snapshot.global_reviews {
        reviews.upsert_global_review(review)?;
    }
    Ok(())
}

/// Rejects snapshots whose records point outside the document.
fn check_references(snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
    let line_ids = unique_ids(EntityKind::Line, snapshot.lines.iter().map(|line| line.id))?;
    let project_lines: HashMap<Uuid, LineId> = snapshot
        .projects
        .iter()
        .map(|project| (project.id, project.line_id))
        .collect();
    unique_ids(
        EntityKind::Project,
        snapshot.projects.iter().map(|project| project.id),
    )?;
    let tasks_by_id: HashMap<Uuid, &Task> =
        snapshot.tasks.iter().map(|task| (task.id, task)).collect();
    unique_ids(EntityKind::Task, snapshot.tasks.iter().map(|task| task.id))?;
    unique_ids(EntityKind::Risk, snapshot.risks.iter().map(|risk| risk.id))?;

    let require_line = |line_id: LineId| {
        if line_ids.contains(&line_id) {
            Ok(())
        } else {
            Err(SnapshotError::DanglingReference {
                kind: EntityKind::Line,
                id: line_id,
            })
        }
    };

    for project in &snapshot.projects {
        require_line(project.line_id)?;
    }
    for task in &snapshot.tasks {
        require_line(task.line_id)?;
        match project_lines.get(&task.project_id) {
            None => {
                return Err(SnapshotError::DanglingReference {
                    kind: EntityKind::Project,
                    id: task.project_id,
                })
            }
            Some(line_id) if *line_id != task.line_id => {
                return Err(SnapshotError::LineMismatch(task.id))
            }
            Some(_) => {}
        }
        if let Some(parent_id) = task.parent_id {
            let parent = tasks_by_id
                .get(&parent_id)
                .ok_or(SnapshotError::DanglingReference {
                    kind: EntityKind::Task,
                    id: parent_id,
                })?;
            if parent.is_subtask() || parent.project_id != task.project_id {
                return Err(SnapshotError::NestedSubtask(task.id));
            }
        }
    }
    for risk in &snapshot.risks {
        require_line(risk.line_id)?;
        if let Some(task_id) = risk.task_id {
            let task = tasks_by_id
                .get(&task_id)
                .ok_or(SnapshotError::DanglingReference {
                    kind: EntityKind::Task,
                    id: task_id,
                })?;
            if task.line_id != risk.line_id {
                return Err(SnapshotError::RiskLineMismatch(risk.id));
            }
        }
    }
    for review in &snapshot.monthly_reviews {
        require_line(review.line_id)?;
    }
    Ok(())
}

fn unique_ids(
    kind: EntityKind,
    ids: impl Iterator<Item = Uuid>,
) -> Result<HashSet<Uuid>, SnapshotError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SnapshotError::DuplicateId { kind, id });
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::{check_references, SnapshotError, StateSnapshot, SNAPSHOT_VERSION};
    use crate::model::{Project, Task, WorkLine};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn empty() -> StateSnapshot {
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at: 0,
            lines: Vec::new(),
            projects: Vec::new(),
            tasks: Vec::new(),
            risks: Vec::new(),
            monthly_reviews: Vec::new(),
            global_reviews: Vec::new(),
        }
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let snapshot = StateSnapshot::from_json(r#"{"version":1,"exported_at":5}"#).unwrap();
        assert_eq!(snapshot.exported_at, 5);
        assert!(snapshot.lines.is_empty() && snapshot.global_reviews.is_empty());
    }

    #[test]
    fn project_without_line_is_dangling() {
        let line = WorkLine::new("General", "");
        let mut snapshot = empty();
        snapshot
            .projects
            .push(Project::new(line.id, "Orphan", date(1), date(2)));
        assert!(matches!(
            check_references(&snapshot),
            Err(SnapshotError::DanglingReference { .. })
        ));
        snapshot.lines.push(line);
        assert!(check_references(&snapshot).is_ok());
    }

    #[test]
    fn two_level_nesting_is_rejected() {
        let line = WorkLine::new("General", "");
        let project = Project::new(line.id, "P", date(1), date(9));
        let root = Task::new(line.id, project.id, "root", date(1), date(2));
        let child = Task::subtask_of(&root, "child", date(1), date(2));
        let grandchild = Task::subtask_of(&child, "grandchild", date(1), date(2));

        let mut snapshot = empty();
        snapshot.lines.push(line);
        snapshot.projects.push(project);
        snapshot.tasks.extend([root, child.clone()]);
        assert!(check_references(&snapshot).is_ok());

        snapshot.tasks.push(grandchild.clone());
        assert!(matches!(
            check_references(&snapshot),
            Err(SnapshotError::NestedSubtask(id)) if id == grandchild.id
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let line = WorkLine::new("General", "");
        let mut snapshot = empty();
        snapshot.lines.extend([line.clone(), line]);
        assert!(matches!(
            check_references(&snapshot),
            Err(SnapshotError::DuplicateId { .. })
        ));
    }
}
