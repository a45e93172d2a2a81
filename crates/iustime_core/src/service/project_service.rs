//! Project use-cases.
//!
//! # Invariants
//! - With `auto_progress` on, stored progress always equals the task
//!   roll-up; caller-provided values are ignored.
//! - With `auto_progress` off, the caller's manual value is kept.

use crate::model::{LineId, Project, ProjectId};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::EntityKind;
use crate::service::task_service::rollup_progress;
use crate::service::{missing, ServiceError, ServiceResult};

pub struct ProjectService<P: ProjectRepository, T: TaskRepository> {
    projects: P,
    tasks: T,
}

impl<P: ProjectRepository, T: TaskRepository> ProjectService<P, T> {
    pub fn new(projects: P, tasks: T) -> Self {
        Self { projects, tasks }
    }

    pub fn create_project(&self, project: &Project) -> ServiceResult<Project> {
        let mut project = normalized(project);
        if project.auto_progress {
            project.progress = 0;
        }
        let id = self.projects.create_project(&project)?;
        log::info!(
            "event=project_create module=service status=ok project_id={} line_id={}",
            id,
            project.line_id
        );
        self.read_back(id, "created project not found in read-back")
    }

    /// Replaces a stored project. A project that owns tasks keeps its line.
    pub fn update_project(&self, project: &Project) -> ServiceResult<Project> {
        let mut project = normalized(project);
        let existing = self.get_project(project.id)?;
        if existing.line_id != project.line_id {
            let owned = self.tasks.list_tasks(&TaskListQuery {
                project_id: Some(project.id),
                ..TaskListQuery::default()
            })?;
            if !owned.is_empty() {
                return Err(ServiceError::Conflict(
                    "a project with tasks cannot move to another line".to_string(),
                ));
            }
        }
        if project.auto_progress {
            let top_level = self
                .tasks
                .list_tasks(&TaskListQuery::top_level_of(project.id))?;
            project.progress = rollup_progress(&top_level);
        }
        self.projects.update_project(&project)?;
        log::info!(
            "event=project_update module=service status=ok project_id={} auto_progress={}",
            project.id,
            project.auto_progress
        );
        self.read_back(project.id, "updated project not found in read-back")
    }

    pub fn get_project(&self, id: ProjectId) -> ServiceResult<Project> {
        self.projects
            .get_project(id)?
            .ok_or_else(|| missing(EntityKind::Project, id))
    }

    /// Lists projects, optionally for one line, filtered by name or assignee.
    pub fn list_projects(
        &self,
        line_id: Option<LineId>,
        search: Option<&str>,
    ) -> ServiceResult<Vec<Project>> {
        let query = ProjectListQuery { line_id };
        let term = search.unwrap_or_default();
        Ok(self
            .projects
            .list_projects(&query)?
            .into_iter()
            .filter(|project| project.matches_search(term))
            .collect())
    }

    /// Deletes a project together with its tasks.
    pub fn delete_project(&self, id: ProjectId) -> ServiceResult<()> {
        self.projects.delete_project(id)?;
        log::info!("event=project_delete module=service status=ok project_id={id}");
        Ok(())
    }

    fn read_back(&self, id: ProjectId, details: &'static str) -> ServiceResult<Project> {
        self.projects
            .get_project(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}

fn normalized(project: &Project) -> Project {
    let mut project = project.clone();
    project.name = project.name.trim().to_string();
    project.next_steps = project
        .next_steps
        .iter()
        .map(|step| step.trim().to_string())
        .filter(|step| !step.is_empty())
        .collect();
    project
}
