//! Task domain model with checklist and attachments.
//!
//! # Responsibility
//! - Define the task record, its checklist items and file attachments.
//! - Provide checklist editing helpers used by services and callers.
//!
//! # Invariants
//! - Subtasking is one level deep; depth is enforced by the task service
//!   because it needs the parent record.
//! - `Attachment::size` always equals the payload length.

use crate::model::common::{
    require_date_range, require_progress, require_text, text_matches, Level, ValidationError,
    WorkStatus,
};
use crate::model::line::LineId;
use crate::model::project::ProjectId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

/// File attached to a task. The payload travels as base64 text in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            data,
            created_at: super::now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "attachment.name")?;
        let actual = self.data.len() as u64;
        if self.size != actual {
            return Err(ValidationError::AttachmentSizeMismatch {
                declared: self.size,
                actual,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Parent task when this is a subtask.
    pub parent_id: Option<TaskId>,
    pub line_id: LineId,
    pub project_id: ProjectId,
    pub title: String,
    pub assignee: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: WorkStatus,
    pub priority: Level,
    pub difficulty: Level,
    pub progress: u8,
    /// Free-text description of what this task waits on.
    pub dependencies: String,
    pub comments: String,
    pub checklist: Vec<ChecklistItem>,
    pub attachments: Vec<Attachment>,
}

impl Task {
    pub fn new(
        line_id: LineId,
        project_id: ProjectId,
        title: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            line_id,
            project_id,
            title: title.into(),
            assignee: String::new(),
            start_date,
            end_date,
            status: WorkStatus::ReadyToStart,
            priority: Level::Medium,
            difficulty: Level::Medium,
            progress: 0,
            dependencies: String::new(),
            comments: String::new(),
            checklist: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Creates a subtask inheriting line and project from `parent`.
    pub fn subtask_of(
        parent: &Task,
        title: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let mut task = Self::new(
            parent.line_id,
            parent.project_id,
            title,
            start_date,
            end_date,
        );
        task.parent_id = Some(parent.id);
        task
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.title, "title")?;
        require_date_range(self.start_date, self.end_date)?;
        require_progress(self.progress)?;
        if self.parent_id == Some(self.id) {
            return Err(ValidationError::SelfParent(self.id));
        }
        for item in &self.checklist {
            require_text(&item.text, "checklist.text")?;
        }
        for attachment in &self.attachments {
            attachment.validate()?;
        }
        Ok(())
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Not completed and already past its end date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_completed() && self.end_date < today
    }

    /// Appends a checklist item; blank text is ignored.
    pub fn add_checklist_item(&mut self, text: &str) -> Option<Uuid> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let item = ChecklistItem {
            id: Uuid::new_v4(),
            text: trimmed.to_string(),
            completed: false,
        };
        let id = item.id;
        self.checklist.push(item);
        Some(id)
    }

    /// Flips completion of one checklist item. Returns `false` if absent.
    pub fn toggle_checklist_item(&mut self, item_id: Uuid) -> bool {
        match self.checklist.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.completed = !item.completed;
                true
            }
            None => false,
        }
    }

    pub fn remove_checklist_item(&mut self, item_id: Uuid) -> bool {
        let before = self.checklist.len();
        self.checklist.retain(|item| item.id != item_id);
        self.checklist.len() != before
    }

    /// Returns `(completed, total)` checklist counts.
    pub fn checklist_progress(&self) -> (usize, usize) {
        let completed = self.checklist.iter().filter(|item| item.completed).count();
        (completed, self.checklist.len())
    }

    pub fn remove_attachment(&mut self, attachment_id: Uuid) -> bool {
        let before = self.attachments.len();
        self.attachments
            .retain(|attachment| attachment.id != attachment_id);
        self.attachments.len() != before
    }

    pub fn matches_search(&self, term: &str) -> bool {
        text_matches(term, &[&self.title])
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
