//! Work line: the top-level grouping every other record is scoped to.

use crate::model::common::{require_text, text_matches, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LineId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLine {
    pub id: LineId,
    pub name: String,
    pub description: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl WorkLine {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            created_at: super::now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")
    }

    pub fn matches_search(&self, term: &str) -> bool {
        text_matches(term, &[&self.name, &self.description])
    }
}
