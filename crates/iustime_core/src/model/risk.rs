//! Risk domain model.

use crate::model::common::{require_text, text_matches, Level, RiskStatus, ValidationError};
use crate::model::line::LineId;
use crate::model::task::TaskId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RiskId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub id: RiskId,
    pub line_id: LineId,
    /// Optional link to a task or subtask of the same line.
    pub task_id: Option<TaskId>,
    pub description: String,
    /// Person accountable for following up.
    pub responsible: String,
    pub required_action: String,
    pub status: RiskStatus,
    pub priority: Level,
    pub impact: Level,
    pub mitigation_strategy: Option<String>,
}

impl Risk {
    /// Creates an open risk with medium priority and impact.
    pub fn new(line_id: LineId, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_id,
            task_id: None,
            description: description.into(),
            responsible: String::new(),
            required_action: String::new(),
            status: RiskStatus::Open,
            priority: Level::Medium,
            impact: Level::Medium,
            mitigation_strategy: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.description, "description")
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn matches_search(&self, term: &str) -> bool {
        text_matches(term, &[&self.description, &self.responsible])
    }
}
