//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist tasks together with their checklist items and attachments.
//! - Keep child-row replacement atomic with the task row write.
//!
//! # Invariants
//! - Checklist and attachment order is preserved through `position`.
//! - Deleting a task cascades to its subtasks and child rows; linked risks
//!   survive with `task_id = NULL`.

use crate::model::{
    Attachment, ChecklistItem, Level, LineId, ProjectId, Task, TaskId, WorkStatus,
};
use crate::repo::{
    bool_to_int, ensure_connection_ready, in_transaction, not_found, parse_enum, parse_flag,
    parse_optional_uuid, parse_progress, parse_uuid, run_atomically, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    parent_id,
    line_id,
    project_id,
    title,
    assignee,
    start_date,
    end_date,
    status,
    priority,
    difficulty,
    progress,
    dependencies,
    comments
FROM tasks";

/// Filter options for listing tasks. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub line_id: Option<LineId>,
    pub project_id: Option<ProjectId>,
    /// Only direct subtasks of this task.
    pub parent_id: Option<TaskId>,
    /// Only tasks without a parent.
    pub top_level_only: bool,
}

impl TaskListQuery {
    pub fn for_line(line_id: LineId) -> Self {
        Self {
            line_id: Some(line_id),
            ..Self::default()
        }
    }

    pub fn top_level_of(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            top_level_only: true,
            ..Self::default()
        }
    }

    pub fn subtasks_of(parent_id: TaskId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }
}

pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    /// Replaces the task row and its full checklist/attachment sets.
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Number of risks linked to the task or to one of its subtasks.
    fn count_linked_risks(&self, id: TaskId) -> RepoResult<usize>;
    /// Runs `f` so that every write it makes commits or rolls back together.
    fn atomically<V, E>(&self, f: impl FnOnce() -> Result<V, E>) -> Result<V, E>
    where
        E: From<RepoError>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["tasks", "task_checklist_items", "task_attachments", "risks"],
        )?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;
        in_transaction(self.conn, |conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id,
                    parent_id,
                    line_id,
                    project_id,
                    title,
                    assignee,
                    start_date,
                    end_date,
                    status,
                    priority,
                    difficulty,
                    progress,
                    dependencies,
                    comments
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
                params![
                    task.id.to_string(),
                    task.parent_id.map(|id| id.to_string()),
                    task.line_id.to_string(),
                    task.project_id.to_string(),
                    task.title.as_str(),
                    task.assignee.as_str(),
                    task.start_date,
                    task.end_date,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.difficulty.as_str(),
                    i64::from(task.progress),
                    task.dependencies.as_str(),
                    task.comments.as_str(),
                ],
            )?;
            insert_children(conn, task)?;
            Ok(task.id)
        })
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        in_transaction(self.conn, |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET
                    parent_id = ?1,
                    line_id = ?2,
                    project_id = ?3,
                    title = ?4,
                    assignee = ?5,
                    start_date = ?6,
                    end_date = ?7,
                    status = ?8,
                    priority = ?9,
                    difficulty = ?10,
                    progress = ?11,
                    dependencies = ?12,
                    comments = ?13,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?14;",
                params![
                    task.parent_id.map(|id| id.to_string()),
                    task.line_id.to_string(),
                    task.project_id.to_string(),
                    task.title.as_str(),
                    task.assignee.as_str(),
                    task.start_date,
                    task.end_date,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.difficulty.as_str(),
                    i64::from(task.progress),
                    task.dependencies.as_str(),
                    task.comments.as_str(),
                    task.id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(not_found(EntityKind::Task, task.id));
            }

            let task_id = task.id.to_string();
            conn.execute(
                "DELETE FROM task_checklist_items WHERE task_id = ?1;",
                [task_id.as_str()],
            )?;
            conn.execute(
                "DELETE FROM task_attachments WHERE task_id = ?1;",
                [task_id.as_str()],
            )?;
            insert_children(conn, task)
        })
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let task = load_task(self.conn, row)?;
            return Ok(Some(task));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(line_id) = query.line_id {
            sql.push_str(" AND line_id = ?");
            bind_values.push(Value::Text(line_id.to_string()));
        }
        if let Some(project_id) = query.project_id {
            sql.push_str(" AND project_id = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }
        if let Some(parent_id) = query.parent_id {
            sql.push_str(" AND parent_id = ?");
            bind_values.push(Value::Text(parent_id.to_string()));
        }
        if query.top_level_only {
            sql.push_str(" AND parent_id IS NULL");
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(load_task(self.conn, row)?);
        }
        Ok(tasks)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(EntityKind::Task, id));
        }
        Ok(())
    }

    fn count_linked_risks(&self, id: TaskId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM risks
             WHERE task_id = ?1
                OR task_id IN (SELECT id FROM tasks WHERE parent_id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("invalid risk count `{count}`")))
    }

    fn atomically<V, E>(&self, f: impl FnOnce() -> Result<V, E>) -> Result<V, E>
    where
        E: From<RepoError>,
    {
        run_atomically(self.conn, f)
    }
}

fn insert_children(conn: &Connection, task: &Task) -> RepoResult<()> {
    let task_id = task.id.to_string();
    for (position, item) in task.checklist.iter().enumerate() {
        conn.execute(
            "INSERT INTO task_checklist_items (id, task_id, position, text, completed)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item.id.to_string(),
                task_id.as_str(),
                position as i64,
                item.text.as_str(),
                bool_to_int(item.completed),
            ],
        )?;
    }
    for (position, attachment) in task.attachments.iter().enumerate() {
        let size = i64::try_from(attachment.size).map_err(|_| {
            RepoError::InvalidData(format!("attachment size {} too large", attachment.size))
        })?;
        conn.execute(
            "INSERT INTO task_attachments (
                id,
                task_id,
                position,
                name,
                mime_type,
                size,
                data,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                attachment.id.to_string(),
                task_id.as_str(),
                position as i64,
                attachment.name.as_str(),
                attachment.mime_type.as_str(),
                size,
                attachment.data.as_slice(),
                attachment.created_at,
            ],
        )?;
    }
    Ok(())
}

fn load_task(conn: &Connection, row: &Row<'_>) -> RepoResult<Task> {
    let mut task = parse_task_row(row)?;
    task.checklist = load_checklist(conn, &task)?;
    task.attachments = load_attachments(conn, &task)?;
    task.validate()?;
    Ok(task)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let line_text: String = row.get("line_id")?;
    let project_text: String = row.get("project_id")?;
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let difficulty_text: String = row.get("difficulty")?;

    Ok(Task {
        id: parse_uuid(&id_text, "tasks.id")?,
        parent_id: parse_optional_uuid(row.get("parent_id")?, "tasks.parent_id")?,
        line_id: parse_uuid(&line_text, "tasks.line_id")?,
        project_id: parse_uuid(&project_text, "tasks.project_id")?,
        title: row.get("title")?,
        assignee: row.get("assignee")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        status: parse_enum(&status_text, "tasks.status", WorkStatus::parse)?,
        priority: parse_enum(&priority_text, "tasks.priority", Level::parse)?,
        difficulty: parse_enum(&difficulty_text, "tasks.difficulty", Level::parse)?,
        progress: parse_progress(row.get("progress")?, "tasks.progress")?,
        dependencies: row.get("dependencies")?,
        comments: row.get("comments")?,
        checklist: Vec::new(),
        attachments: Vec::new(),
    })
}

fn load_checklist(conn: &Connection, task: &Task) -> RepoResult<Vec<ChecklistItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, completed
         FROM task_checklist_items
         WHERE task_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task.id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        items.push(ChecklistItem {
            id: parse_uuid(&id_text, "task_checklist_items.id")?,
            text: row.get("text")?,
            completed: parse_flag(row.get("completed")?, "task_checklist_items.completed")?,
        });
    }
    Ok(items)
}

fn load_attachments(conn: &Connection, task: &Task) -> RepoResult<Vec<Attachment>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, mime_type, size, data, created_at
         FROM task_attachments
         WHERE task_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task.id.to_string()])?;
    let mut attachments = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let size: i64 = row.get("size")?;
        attachments.push(Attachment {
            id: parse_uuid(&id_text, "task_attachments.id")?,
            name: row.get("name")?,
            mime_type: row.get("mime_type")?,
            size: u64::try_from(size).map_err(|_| {
                RepoError::InvalidData(format!("invalid size `{size}` in task_attachments.size"))
            })?,
            data: row.get("data")?,
            created_at: row.get("created_at")?,
        });
    }
    Ok(attachments)
}
