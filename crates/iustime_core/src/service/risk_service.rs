//! Risk use-cases.

use crate::model::{Risk, RiskId};
use crate::repo::risk_repo::{RiskListQuery, RiskRepository};
use crate::repo::task_repo::TaskRepository;
use crate::repo::EntityKind;
use crate::service::{missing, ServiceError, ServiceResult};

pub struct RiskService<R: RiskRepository, T: TaskRepository> {
    risks: R,
    tasks: T,
}

impl<R: RiskRepository, T: TaskRepository> RiskService<R, T> {
    pub fn new(risks: R, tasks: T) -> Self {
        Self { risks, tasks }
    }

    pub fn create_risk(&self, risk: &Risk) -> ServiceResult<Risk> {
        let risk = normalized(risk);
        self.check_task_link(&risk)?;
        let id = self.risks.create_risk(&risk)?;
        log::info!(
            "event=risk_create module=service status=ok risk_id={} linked_task={}",
            id,
            risk.task_id.is_some()
        );
        self.read_back(id, "created risk not found in read-back")
    }

    pub fn update_risk(&self, risk: &Risk) -> ServiceResult<Risk> {
        let risk = normalized(risk);
        self.check_task_link(&risk)?;
        self.risks.update_risk(&risk)?;
        log::info!("event=risk_update module=service status=ok risk_id={}", risk.id);
        self.read_back(risk.id, "updated risk not found in read-back")
    }

    pub fn delete_risk(&self, id: RiskId) -> ServiceResult<()> {
        self.risks.delete_risk(id)?;
        log::info!("event=risk_delete module=service status=ok risk_id={id}");
        Ok(())
    }

    pub fn get_risk(&self, id: RiskId) -> ServiceResult<Risk> {
        self.risks
            .get_risk(id)?
            .ok_or_else(|| missing(EntityKind::Risk, id))
    }

    /// Lists risks filtered by description or responsible person.
    pub fn list_risks(
        &self,
        query: &RiskListQuery,
        search: Option<&str>,
    ) -> ServiceResult<Vec<Risk>> {
        let term = search.unwrap_or_default();
        Ok(self
            .risks
            .list_risks(query)?
            .into_iter()
            .filter(|risk| risk.matches_search(term))
            .collect())
    }

    /// A linked task must exist and live in the risk's line.
    fn check_task_link(&self, risk: &Risk) -> ServiceResult<()> {
        let Some(task_id) = risk.task_id else {
            return Ok(());
        };
        let task = self
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| missing(EntityKind::Task, task_id))?;
        if task.line_id != risk.line_id {
            return Err(ServiceError::LineMismatch {
                expected: risk.line_id,
                actual: task.line_id,
            });
        }
        Ok(())
    }

    fn read_back(&self, id: RiskId, details: &'static str) -> ServiceResult<Risk> {
        self.risks
            .get_risk(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}

fn normalized(risk: &Risk) -> Risk {
    let mut risk = risk.clone();
    risk.description = risk.description.trim().to_string();
    risk.mitigation_strategy = risk
        .mitigation_strategy
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    risk
}
