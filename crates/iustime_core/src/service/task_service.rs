//! Task use-cases and project progress roll-up.
//!
//! # Responsibility
//! - Enforce subtask placement and same-line rules before writes.
//! - Keep project progress in sync with top-level task progress.
//! - Provide checklist and attachment editing on stored tasks.
//!
//! # Invariants
//! - Subtasking is one level deep and never crosses projects.
//! - A task's line always equals its project's line.
//! - A task never leaves its line while a risk links to it or a subtask.
//! - A task write and the roll-ups it triggers commit together.
//! - After every task write, each affected project with `auto_progress`
//!   holds `round_half_up(mean(top-level progress))`, or 0 without tasks.

use crate::model::{mean_percent, Attachment, Project, ProjectId, Task, TaskId};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::EntityKind;
use crate::service::{missing, ServiceError, ServiceResult};
use serde::Serialize;
use uuid::Uuid;

/// Progress of a project derived from its top-level tasks.
///
/// Subtasks in `tasks` are ignored; an empty set rolls up to 0.
pub fn rollup_progress(tasks: &[Task]) -> u8 {
    mean_percent(
        tasks
            .iter()
            .filter(|task| !task.is_subtask())
            .map(|task| task.progress),
    )
    .unwrap_or(0)
}

/// One top-level task with its direct subtasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskNode {
    pub task: Task,
    pub subtasks: Vec<Task>,
}

/// Top-level tasks grouped under their project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTaskGroup {
    pub project: Project,
    pub tasks: Vec<TaskNode>,
}

/// Groups tasks under their projects, keeping input order.
///
/// A group is kept when the project name or any top-level task title
/// matches `search`; kept groups always carry all of their tasks.
pub fn group_tasks_by_project(
    projects: &[Project],
    tasks: &[Task],
    search: &str,
) -> Vec<ProjectTaskGroup> {
    projects
        .iter()
        .filter_map(|project| {
            let top_level: Vec<&Task> = tasks
                .iter()
                .filter(|task| task.project_id == project.id && !task.is_subtask())
                .collect();
            let keep = crate::model::text_matches(search, &[&project.name])
                || top_level.iter().any(|task| task.matches_search(search));
            if !keep {
                return None;
            }
            let nodes = top_level
                .into_iter()
                .map(|task| TaskNode {
                    task: task.clone(),
                    subtasks: tasks
                        .iter()
                        .filter(|candidate| candidate.parent_id == Some(task.id))
                        .cloned()
                        .collect(),
                })
                .collect();
            Some(ProjectTaskGroup {
                project: project.clone(),
                tasks: nodes,
            })
        })
        .collect()
}

pub struct TaskService<T: TaskRepository, P: ProjectRepository> {
    tasks: T,
    projects: P,
}

impl<T: TaskRepository, P: ProjectRepository> TaskService<T, P> {
    pub fn new(tasks: T, projects: P) -> Self {
        Self { tasks, projects }
    }

    pub fn create_task(&self, task: &Task) -> ServiceResult<Task> {
        let mut task = task.clone();
        task.title = task.title.trim().to_string();
        self.check_project_link(&task)?;
        if let Some(parent_id) = task.parent_id {
            self.check_parent(&task, parent_id)?;
        }

        let id = self.tasks.atomically(|| {
            let id = self.tasks.create_task(&task)?;
            self.refresh_progress(task.project_id)?;
            Ok::<_, ServiceError>(id)
        })?;
        log::info!(
            "event=task_create module=service status=ok task_id={} project_id={} subtask={}",
            id,
            task.project_id,
            task.is_subtask()
        );
        self.read_back(id, "created task not found in read-back")
    }

    /// Replaces a stored task. Moving a top-level task to another project
    /// moves its subtasks with it; both projects are recomputed.
    ///
    /// A line change is refused while risks link to the task or its
    /// subtasks.
    pub fn update_task(&self, task: &Task) -> ServiceResult<Task> {
        let mut task = task.clone();
        task.title = task.title.trim().to_string();
        let existing = self.get_task(task.id)?;
        self.check_project_link(&task)?;
        if let Some(parent_id) = task.parent_id {
            self.check_parent(&task, parent_id)?;
            let children = self.tasks.list_tasks(&TaskListQuery::subtasks_of(task.id))?;
            if !children.is_empty() {
                return Err(ServiceError::InvalidParent(
                    "a task with subtasks cannot become a subtask".to_string(),
                ));
            }
        }

        let moved = existing.project_id != task.project_id;
        if existing.line_id != task.line_id {
            let count = self.tasks.count_linked_risks(task.id)?;
            if count > 0 {
                return Err(ServiceError::LinkedRisks {
                    task_id: task.id,
                    count,
                });
            }
        }

        self.tasks.atomically(|| {
            self.tasks.update_task(&task)?;
            if moved {
                for mut child in self.tasks.list_tasks(&TaskListQuery::subtasks_of(task.id))? {
                    child.project_id = task.project_id;
                    child.line_id = task.line_id;
                    self.tasks.update_task(&child)?;
                }
                self.refresh_progress(existing.project_id)?;
            }
            self.refresh_progress(task.project_id)?;
            Ok::<_, ServiceError>(())
        })?;
        log::info!(
            "event=task_update module=service status=ok task_id={} moved={}",
            task.id,
            moved
        );
        self.read_back(task.id, "updated task not found in read-back")
    }

    /// Deletes a task with its subtasks and recomputes its project.
    pub fn delete_task(&self, id: TaskId) -> ServiceResult<()> {
        let existing = self.get_task(id)?;
        self.tasks.atomically(|| {
            self.tasks.delete_task(id)?;
            self.refresh_progress(existing.project_id)?;
            Ok::<_, ServiceError>(())
        })?;
        log::info!("event=task_delete module=service status=ok task_id={id}");
        Ok(())
    }

    pub fn get_task(&self, id: TaskId) -> ServiceResult<Task> {
        self.tasks
            .get_task(id)?
            .ok_or_else(|| missing(EntityKind::Task, id))
    }

    pub fn list_tasks(
        &self,
        query: &TaskListQuery,
        search: Option<&str>,
    ) -> ServiceResult<Vec<Task>> {
        let term = search.unwrap_or_default();
        Ok(self
            .tasks
            .list_tasks(query)?
            .into_iter()
            .filter(|task| task.matches_search(term))
            .collect())
    }

    pub fn add_checklist_item(&self, task_id: TaskId, text: &str) -> ServiceResult<Task> {
        self.edit_task(task_id, |task| {
            task.add_checklist_item(text)
                .map(|_| ())
                .ok_or(ServiceError::Validation(
                    crate::model::ValidationError::BlankField("checklist.text"),
                ))
        })
    }

    pub fn toggle_checklist_item(&self, task_id: TaskId, item_id: Uuid) -> ServiceResult<Task> {
        self.edit_task(task_id, |task| {
            if task.toggle_checklist_item(item_id) {
                Ok(())
            } else {
                Err(missing(EntityKind::ChecklistItem, item_id))
            }
        })
    }

    pub fn remove_checklist_item(&self, task_id: TaskId, item_id: Uuid) -> ServiceResult<Task> {
        self.edit_task(task_id, |task| {
            if task.remove_checklist_item(item_id) {
                Ok(())
            } else {
                Err(missing(EntityKind::ChecklistItem, item_id))
            }
        })
    }

    pub fn add_attachment(
        &self,
        task_id: TaskId,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ServiceResult<Task> {
        let attachment = Attachment::new(name.trim(), mime_type.trim(), data);
        attachment.validate()?;
        self.edit_task(task_id, move |task| {
            task.attachments.push(attachment);
            Ok(())
        })
    }

    pub fn remove_attachment(&self, task_id: TaskId, attachment_id: Uuid) -> ServiceResult<Task> {
        self.edit_task(task_id, |task| {
            if task.remove_attachment(attachment_id) {
                Ok(())
            } else {
                Err(missing(EntityKind::Attachment, attachment_id))
            }
        })
    }

    /// Recomputes and stores the roll-up of one project.
    ///
    /// Returns the stored progress, or `None` when the project is gone or
    /// uses manual progress.
    pub fn refresh_progress(&self, project_id: ProjectId) -> ServiceResult<Option<u8>> {
        let Some(project) = self.projects.get_project(project_id)? else {
            return Ok(None);
        };
        if !project.auto_progress {
            return Ok(None);
        }
        let top_level = self
            .tasks
            .list_tasks(&TaskListQuery::top_level_of(project_id))?;
        let progress = rollup_progress(&top_level);
        if progress != project.progress {
            self.projects.set_progress(project_id, progress)?;
            log::debug!(
                "event=progress_rollup module=service status=ok project_id={} progress={}",
                project_id,
                progress
            );
        }
        Ok(Some(progress))
    }

    fn edit_task(
        &self,
        task_id: TaskId,
        edit: impl FnOnce(&mut Task) -> ServiceResult<()>,
    ) -> ServiceResult<Task> {
        let mut task = self.get_task(task_id)?;
        edit(&mut task)?;
        self.tasks.update_task(&task)?;
        self.read_back(task_id, "edited task not found in read-back")
    }

    fn check_project_link(&self, task: &Task) -> ServiceResult<()> {
        let project = self
            .projects
            .get_project(task.project_id)?
            .ok_or_else(|| missing(EntityKind::Project, task.project_id))?;
        if project.line_id != task.line_id {
            return Err(ServiceError::LineMismatch {
                expected: project.line_id,
                actual: task.line_id,
            });
        }
        Ok(())
    }

    fn check_parent(&self, task: &Task, parent_id: TaskId) -> ServiceResult<()> {
        if parent_id == task.id {
            return Err(ServiceError::InvalidParent(
                "a task cannot be its own parent".to_string(),
            ));
        }
        let parent = self.tasks.get_task(parent_id)?.ok_or_else(|| {
            ServiceError::InvalidParent(format!("parent task {parent_id} does not exist"))
        })?;
        if parent.is_subtask() {
            return Err(ServiceError::InvalidParent(
                "subtasks cannot have subtasks".to_string(),
            ));
        }
        if parent.project_id != task.project_id {
            return Err(ServiceError::InvalidParent(
                "parent task belongs to another project".to_string(),
            ));
        }
        Ok(())
    }

    fn read_back(&self, id: TaskId, details: &'static str) -> ServiceResult<Task> {
        self.tasks
            .get_task(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}

#[cfg(test)]
mod tests {
    use super::{group_tasks_by_project, rollup_progress};
    use crate::model::{Project, Task};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn task(project: &Project, title: &str, progress: u8) -> Task {
        let mut task = Task::new(project.line_id, project.id, title, date(1), date(10));
        task.progress = progress;
        task
    }

    #[test]
    fn rollup_averages_top_level_tasks_only() {
        let project = Project::new(Uuid::new_v4(), "Cloud", date(1), date(30));
        let a = task(&project, "a", 50);
        let b = task(&project, "b", 75);
        let mut sub = Task::subtask_of(&a, "sub", date(1), date(2));
        sub.progress = 0;

        assert_eq!(rollup_progress(&[]), 0);
        assert_eq!(rollup_progress(&[a.clone()]), 50);
        // 62.5 rounds half-up.
        assert_eq!(rollup_progress(&[a, b, sub]), 63);
    }

    #[test]
    fn grouping_keeps_matching_projects_with_all_tasks() {
        let line = Uuid::new_v4();
        let cloud = Project::new(line, "Cloud Migration", date(1), date(30));
        let legal = Project::new(line, "Legal", date(1), date(30));
        let parent = task(&cloud, "Inventory", 0);
        let other = task(&cloud, "Cutover", 0);
        let sub = Task::subtask_of(&parent, "List servers", date(1), date(2));
        let contract = task(&legal, "Contract review", 0);
        let projects = vec![cloud.clone(), legal.clone()];
        let tasks = vec![parent.clone(), other, sub.clone(), contract];

        let all = group_tasks_by_project(&projects, &tasks, "");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tasks.len(), 2);
        assert_eq!(all[0].tasks[0].subtasks, vec![sub]);

        let by_project = group_tasks_by_project(&projects, &tasks, "cloud");
        assert_eq!(by_project.len(), 1);
        assert_eq!(by_project[0].tasks.len(), 2);

        let by_task = group_tasks_by_project(&projects, &tasks, "CONTRACT");
        assert_eq!(by_task.len(), 1);
        assert_eq!(by_task[0].project.id, legal.id);

        // Subtask titles do not make a group match.
        assert!(group_tasks_by_project(&projects, &tasks, "servers").is_empty());
    }
}
