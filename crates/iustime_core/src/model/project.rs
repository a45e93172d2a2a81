//! Project domain model.
//!
//! # Invariants
//! - `end_date >= start_date`.
//! - `progress` stays within `0..=100`.
//! - With `auto_progress` on, `progress` is owned by the task roll-up and
//!   caller-provided values are overwritten on write.

use crate::model::common::{
    require_date_range, require_progress, require_text, text_matches, Level, ValidationError,
    WorkStatus,
};
use crate::model::line::LineId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub line_id: LineId,
    pub name: String,
    pub objective: String,
    pub assignee: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: WorkStatus,
    pub priority: Level,
    pub difficulty: Level,
    /// Ordered list of short follow-up actions.
    pub next_steps: Vec<String>,
    pub notes: String,
    pub budget: f64,
    pub progress: u8,
    /// When set, progress is the rounded mean of top-level task progress.
    pub auto_progress: bool,
}

impl Project {
    /// Creates a project with form defaults: ready to start, medium
    /// priority and difficulty, zero progress, automatic roll-up.
    pub fn new(
        line_id: LineId,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_id,
            name: name.into(),
            objective: String::new(),
            assignee: String::new(),
            start_date,
            end_date,
            status: WorkStatus::ReadyToStart,
            priority: Level::Medium,
            difficulty: Level::Medium,
            next_steps: Vec::new(),
            notes: String::new(),
            budget: 0.0,
            progress: 0,
            auto_progress: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")?;
        require_date_range(self.start_date, self.end_date)?;
        require_progress(self.progress)?;
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(ValidationError::InvalidBudget(self.budget));
        }
        for step in &self.next_steps {
            require_text(step, "next_steps")?;
        }
        Ok(())
    }

    /// Appends a trimmed next step; blank input is ignored.
    pub fn push_next_step(&mut self, step: &str) -> bool {
        let trimmed = step.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.next_steps.push(trimmed.to_string());
        true
    }

    /// Removes the next step at `index`, if present.
    pub fn remove_next_step(&mut self, index: usize) -> Option<String> {
        if index < self.next_steps.len() {
            Some(self.next_steps.remove(index))
        } else {
            None
        }
    }

    pub fn matches_search(&self, term: &str) -> bool {
        text_matches(term, &[&self.name, &self.assignee])
    }
}

#[cfg(test)]
mod tests {
    use super::Project;
    use crate::model::common::ValidationError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_project_uses_form_defaults() {
        let project = Project::new(Uuid::new_v4(), "Cloud", date(2025, 1, 1), date(2025, 3, 1));
        assert!(project.auto_progress);
        assert_eq!(project.progress, 0);
        assert!(project.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_budget_and_blank_steps() {
        let mut project =
            Project::new(Uuid::new_v4(), "Cloud", date(2025, 1, 1), date(2025, 3, 1));
        project.budget = -1.0;
        assert!(matches!(
            project.validate(),
            Err(ValidationError::InvalidBudget(_))
        ));

        project.budget = 10.0;
        project.next_steps.push("  ".to_string());
        assert_eq!(
            project.validate(),
            Err(ValidationError::BlankField("next_steps"))
        );
    }

    #[test]
    fn next_steps_ignore_blank_input() {
        let mut project =
            Project::new(Uuid::new_v4(), "Cloud", date(2025, 1, 1), date(2025, 3, 1));
        assert!(!project.push_next_step("   "));
        assert!(project.push_next_step("  kickoff "));
        assert_eq!(project.next_steps, vec!["kickoff".to_string()]);
        assert_eq!(project.remove_next_step(3), None);
        assert_eq!(project.remove_next_step(0).as_deref(), Some("kickoff"));
    }
}
