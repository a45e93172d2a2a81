//! Monthly report drafting.
//!
//! # Responsibility
//! - Describe a line or the whole organization as a compact prompt context.
//! - Turn that context into a narrative draft, remotely or offline.
//!
//! # Invariants
//! - Generation never fails to the caller; failures become a fallback draft
//!   whose `origin` carries the reason.
//! - Drafts and prompts are never logged; only their metadata is.

use crate::dashboard::GlobalDashboard;
use crate::model::{Project, ReviewMonth, Risk, Task, WorkLine, WorkStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

pub mod gemini;
pub mod offline;
pub mod prompt;

pub use gemini::GeminiReviewGenerator;
pub use offline::OfflineReviewGenerator;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Language the narrative is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLanguage {
    #[default]
    Spanish,
    English,
}

impl ReportLanguage {
    pub fn code(self) -> &'static str {
        match self {
            Self::Spanish => "es",
            Self::English => "en",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Spanish => "Spanish",
            Self::English => "English",
        }
    }
}

impl FromStr for ReportLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" | "spanish" | "español" => Ok(Self::Spanish),
            "en" | "english" => Ok(Self::English),
            other => Err(format!("unsupported report language `{other}`")),
        }
    }
}

/// Remote generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiSettings {
    /// Without a key every draft is produced offline.
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL; `/models/{model}:generateContent` is appended.
    pub endpoint: String,
    pub timeout: Duration,
    pub language: ReportLanguage,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            language: ReportLanguage::default(),
        }
    }
}

/// Where a draft came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftOrigin {
    /// Produced by the remote model.
    Generated,
    /// Produced locally because no API key is configured.
    Offline,
    /// Remote generation failed; the narrative asks for a manual review.
    Fallback { reason: String },
}

impl DraftOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Offline => "offline",
            Self::Fallback { .. } => "fallback",
        }
    }
}

/// Failure talking to the remote model.
#[derive(Debug)]
pub enum AiError {
    /// No API key configured.
    MissingApiKey,
    /// HTTP client could not be built.
    Client(String),
    /// Request did not complete (connect, timeout, body read).
    Transport(String),
    /// Remote answered with a non-success status.
    Status(u16),
    /// Response envelope lacks the expected text part.
    InvalidResponse(&'static str),
    /// Model text is not the expected JSON object.
    Parse(String),
}

impl AiError {
    /// Short stable label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Client(_) => "client",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Parse(_) => "parse",
        }
    }
}

impl Display for AiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "no API key configured"),
            Self::Client(message) => write!(f, "cannot build HTTP client: {message}"),
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Status(status) => write!(f, "generation endpoint returned HTTP {status}"),
            Self::InvalidResponse(details) => write!(f, "unexpected response shape: {details}"),
            Self::Parse(message) => write!(f, "cannot parse generated draft: {message}"),
        }
    }
}

impl Error for AiError {}

/// One project line in a monthly prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectBrief {
    pub name: String,
    pub status: WorkStatus,
    pub progress: u8,
}

/// Snapshot of one line used to draft its monthly review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewContext {
    pub line_name: String,
    pub month: ReviewMonth,
    pub projects: Vec<ProjectBrief>,
    pub completed_tasks: Vec<String>,
    /// Not completed and past their end date as of `today`.
    pub overdue_tasks: Vec<String>,
    pub active_risks: Vec<String>,
}

impl ReviewContext {
    /// Builds the context from the line's current records.
    pub fn collect(
        line: &WorkLine,
        month: ReviewMonth,
        today: NaiveDate,
        projects: &[Project],
        tasks: &[Task],
        risks: &[Risk],
    ) -> Self {
        Self {
            line_name: line.name.clone(),
            month,
            projects: projects
                .iter()
                .map(|project| ProjectBrief {
                    name: project.name.clone(),
                    status: project.status,
                    progress: project.progress,
                })
                .collect(),
            completed_tasks: tasks
                .iter()
                .filter(|task| task.status.is_completed())
                .map(|task| task.title.clone())
                .collect(),
            overdue_tasks: tasks
                .iter()
                .filter(|task| task.is_overdue(today))
                .map(|task| task.title.clone())
                .collect(),
            active_risks: risks
                .iter()
                .filter(|risk| risk.is_active())
                .map(|risk| risk.description.clone())
                .collect(),
        }
    }

    pub fn average_progress(&self) -> u8 {
        crate::model::mean_percent(self.projects.iter().map(|project| project.progress))
            .unwrap_or(0)
    }
}

/// Per-line figures carried into the global prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineBrief {
    pub name: String,
    pub project_count: usize,
    pub active_risks: usize,
    pub health: u8,
}

/// Organization-wide snapshot used to draft the global review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalReviewContext {
    pub month: ReviewMonth,
    pub global_health: u8,
    pub total_projects: usize,
    pub critical_risks: Vec<String>,
    pub lines: Vec<LineBrief>,
}

impl GlobalReviewContext {
    pub fn from_dashboard(month: ReviewMonth, dashboard: &GlobalDashboard) -> Self {
        Self {
            month,
            global_health: dashboard.global_health,
            total_projects: dashboard.total_projects,
            critical_risks: dashboard
                .critical_risks
                .iter()
                .map(|risk| risk.description.clone())
                .collect(),
            lines: dashboard
                .line_stats
                .iter()
                .map(|stats| LineBrief {
                    name: stats.line_name.clone(),
                    project_count: stats.project_count,
                    active_risks: stats.active_risks,
                    health: stats.health,
                })
                .collect(),
        }
    }
}

/// Narrative sections of a monthly review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewDraft {
    pub summary: String,
    pub achievements: String,
    pub issues: String,
    pub next_steps: String,
    pub origin: DraftOrigin,
}

impl ReviewDraft {
    /// Parses the model's JSON text (`summary`, `achievements`, `issues`,
    /// `nextSteps`). Array values are joined one item per line.
    pub fn from_model_text(text: &str) -> Result<Self, AiError> {
        let object = parse_object(text)?;
        Ok(Self {
            summary: text_field(&object, &["summary"]),
            achievements: text_field(&object, &["achievements"]),
            issues: text_field(&object, &["issues"]),
            next_steps: text_field(&object, &["nextSteps", "next_steps"]),
            origin: DraftOrigin::Generated,
        })
    }
}

/// Narrative sections of a global review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalReviewDraft {
    pub vision: String,
    pub milestones: String,
    pub attention_areas: String,
    pub strategy: String,
    pub origin: DraftOrigin,
}

impl GlobalReviewDraft {
    /// Parses `vision`, `milestones`, `attentionAreas`, `strategy`.
    pub fn from_model_text(text: &str) -> Result<Self, AiError> {
        let object = parse_object(text)?;
        Ok(Self {
            vision: text_field(&object, &["vision"]),
            milestones: text_field(&object, &["milestones"]),
            attention_areas: text_field(&object, &["attentionAreas", "attention_areas"]),
            strategy: text_field(&object, &["strategy"]),
            origin: DraftOrigin::Generated,
        })
    }
}

/// Produces review drafts. Implementations must not fail.
pub trait ReviewGenerator {
    fn generate_monthly(&self, context: &ReviewContext) -> ReviewDraft;
    fn generate_global(&self, context: &GlobalReviewContext) -> GlobalReviewDraft;
}

impl<G: ReviewGenerator + ?Sized> ReviewGenerator for &G {
    fn generate_monthly(&self, context: &ReviewContext) -> ReviewDraft {
        (**self).generate_monthly(context)
    }

    fn generate_global(&self, context: &GlobalReviewContext) -> GlobalReviewDraft {
        (**self).generate_global(context)
    }
}

fn parse_object(text: &str) -> Result<serde_json::Map<String, Value>, AiError> {
    let json_text = strip_code_fence(text);
    match serde_json::from_str::<Value>(json_text) {
        Ok(Value::Object(object)) if !object.is_empty() => Ok(object),
        Ok(_) => Err(AiError::Parse("expected a non-empty JSON object".to_string())),
        Err(err) => Err(AiError::Parse(err.to_string())),
    }
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = trimmed.find('\n').map(|index| index + 1).unwrap_or(trimmed.len());
    let body = &trimmed[start..];
    let end = body.rfind("```").unwrap_or(body.len());
    body[..end].trim()
}

fn text_field(object: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    let Some(value) = keys.iter().find_map(|key| object.get(*key)) else {
        return String::new();
    };
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DraftOrigin, GlobalReviewDraft, ReportLanguage, ReviewDraft};

    #[test]
    fn monthly_draft_parses_camel_case_keys() {
        let draft = ReviewDraft::from_model_text(
            r#"{"summary":" Good month ","achievements":"A","issues":"I","nextSteps":"N"}"#,
        )
        .unwrap();
        assert_eq!(draft.summary, "Good month");
        assert_eq!(draft.next_steps, "N");
        assert_eq!(draft.origin, DraftOrigin::Generated);
    }

    #[test]
    fn monthly_draft_accepts_fenced_json_and_arrays() {
        let text = "```json\n{\"summary\":\"S\",\"achievements\":[\"one\",\"two\"]}\n```";
        let draft = ReviewDraft::from_model_text(text).unwrap();
        assert_eq!(draft.achievements, "one\ntwo");
        assert_eq!(draft.issues, "");
    }

    #[test]
    fn draft_parsing_rejects_non_objects() {
        assert!(ReviewDraft::from_model_text("not json").is_err());
        assert!(ReviewDraft::from_model_text("[1,2]").is_err());
        assert!(ReviewDraft::from_model_text("{}").is_err());
    }

    #[test]
    fn global_draft_reads_attention_areas() {
        let draft = GlobalReviewDraft::from_model_text(
            r#"{"vision":"V","milestones":"M","attentionAreas":"A","strategy":"S"}"#,
        )
        .unwrap();
        assert_eq!(draft.attention_areas, "A");
    }

    #[test]
    fn language_parses_codes_and_names() {
        assert_eq!("ES".parse::<ReportLanguage>(), Ok(ReportLanguage::Spanish));
        assert_eq!(
            "english".parse::<ReportLanguage>(),
            Ok(ReportLanguage::English)
        );
        assert!("fr".parse::<ReportLanguage>().is_err());
    }
}
