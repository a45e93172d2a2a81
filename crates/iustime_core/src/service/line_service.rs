//! Work line use-cases.

use crate::model::{LineId, WorkLine};
use crate::repo::line_repo::LineRepository;
use crate::repo::EntityKind;
use crate::service::{missing, ServiceError, ServiceResult};

pub struct LineService<R: LineRepository> {
    repo: R,
}

impl<R: LineRepository> LineService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a line with trimmed name and description.
    pub fn create_line(&self, name: &str, description: &str) -> ServiceResult<WorkLine> {
        let line = WorkLine::new(name.trim(), description.trim());
        let id = self.repo.create_line(&line)?;
        log::info!("event=line_create module=service status=ok line_id={id}");
        self.read_back(id, "created line not found in read-back")
    }

    pub fn update_line(&self, line: &WorkLine) -> ServiceResult<WorkLine> {
        let mut line = line.clone();
        line.name = line.name.trim().to_string();
        line.description = line.description.trim().to_string();
        self.repo.update_line(&line)?;
        log::info!("event=line_update module=service status=ok line_id={}", line.id);
        self.read_back(line.id, "updated line not found in read-back")
    }

    pub fn get_line(&self, id: LineId) -> ServiceResult<WorkLine> {
        self.repo
            .get_line(id)?
            .ok_or_else(|| missing(EntityKind::Line, id))
    }

    /// Lists lines in creation order, filtered by name or description.
    pub fn list_lines(&self, search: Option<&str>) -> ServiceResult<Vec<WorkLine>> {
        let term = search.unwrap_or_default();
        let lines = self.repo.list_lines()?;
        Ok(lines
            .into_iter()
            .filter(|line| line.matches_search(term))
            .collect())
    }

    /// Deletes a line and everything scoped to it.
    ///
    /// Fails with `Conflict` while users are still assigned to the line.
    pub fn delete_line(&self, id: LineId) -> ServiceResult<()> {
        self.repo.delete_line(id)?;
        log::info!("event=line_delete module=service status=ok line_id={id}");
        Ok(())
    }

    fn read_back(&self, id: LineId, details: &'static str) -> ServiceResult<WorkLine> {
        self.repo
            .get_line(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}
