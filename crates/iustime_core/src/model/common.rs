//! Shared enums and validation errors for all domain records.
//!
//! # Invariants
//! - Every enum has exactly one snake_case storage form.
//! - Parsing from text accepts `-`/`_`/space separators, case-insensitive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state shared by projects and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Planned, not started yet.
    ReadyToStart,
    /// Work is ongoing.
    InProgress,
    /// Behind schedule.
    Delayed,
    /// Finished.
    Completed,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 4] = [
        WorkStatus::ReadyToStart,
        WorkStatus::InProgress,
        WorkStatus::Delayed,
        WorkStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadyToStart => "ready_to_start",
            Self::InProgress => "in_progress",
            Self::Delayed => "delayed",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "ready_to_start" => Some(Self::ReadyToStart),
            "in_progress" => Some(Self::InProgress),
            "delayed" => Some(Self::Delayed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Three-step scale used for priority, difficulty and impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Risk lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Open,
    InProgress,
    Mitigated,
    Closed,
}

impl RiskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Mitigated => "mitigated",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "mitigated" => Some(Self::Mitigated),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Open and in-progress risks still need attention.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Sees and manages every line.
    Admin,
    /// Locked to one assigned line.
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Error for text that does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl Display for ParseEnumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl Error for ParseEnumError {}

impl FromStr for WorkStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseEnumError {
            kind: "status",
            value: s.to_string(),
        })
    }
}

impl FromStr for Level {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseEnumError {
            kind: "level",
            value: s.to_string(),
        })
    }
}

impl FromStr for RiskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseEnumError {
            kind: "risk status",
            value: s.to_string(),
        })
    }
}

impl FromStr for UserRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseEnumError {
            kind: "role",
            value: s.to_string(),
        })
    }
}

impl Display for WorkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for RiskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_token(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

/// Record-level validation failure raised before any persistence write.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// `end_date` is earlier than `start_date`.
    DateRangeReversed { start: NaiveDate, end: NaiveDate },
    /// Progress must stay within `0..=100`.
    ProgressOutOfRange(u8),
    /// Budget is negative or not finite.
    InvalidBudget(f64),
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Month is not `YYYY-MM`.
    InvalidMonth(String),
    /// Attachment metadata disagrees with its payload.
    AttachmentSizeMismatch { declared: u64, actual: u64 },
    /// Standard users must be bound to a line.
    MissingAssignedLine,
    /// Admins are never bound to a line.
    UnexpectedAssignedLine,
    /// A task cannot be nested under itself.
    SelfParent(Uuid),
    /// Epoch-ms timestamp is before 1970.
    NegativeTimestamp(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::DateRangeReversed { start, end } => {
                write!(f, "end_date {end} is earlier than start_date {start}")
            }
            Self::ProgressOutOfRange(value) => {
                write!(f, "progress {value} is out of range 0..=100")
            }
            Self::InvalidBudget(value) => write!(f, "budget {value} must be a finite value >= 0"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::InvalidMonth(value) => write!(f, "invalid month `{value}`; expected YYYY-MM"),
            Self::AttachmentSizeMismatch { declared, actual } => write!(
                f,
                "attachment size {declared} does not match payload length {actual}"
            ),
            Self::MissingAssignedLine => write!(f, "standard users require an assigned line"),
            Self::UnexpectedAssignedLine => write!(f, "admins cannot be assigned to a line"),
            Self::SelfParent(id) => write!(f, "task {id} cannot be its own parent"),
            Self::NegativeTimestamp(field) => write!(f, "`{field}` must not be negative"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::DateRangeReversed { start, end });
    }
    Ok(())
}

pub(crate) fn require_progress(value: u8) -> Result<(), ValidationError> {
    if value > 100 {
        return Err(ValidationError::ProgressOutOfRange(value));
    }
    Ok(())
}

/// Case-insensitive substring match used by every list filter.
///
/// An empty or blank term matches everything.
pub fn text_matches(term: &str, fields: &[&str]) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(needle.as_str()))
}

/// Rounds a percentage half-up and clamps it to `0..=100`.
pub fn round_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value + 0.5).floor().clamp(0.0, 100.0) as u8
}

/// Rounded mean of `values`, or `None` when empty.
pub fn mean_percent(values: impl IntoIterator<Item = u8>) -> Option<u8> {
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), value| (sum + u64::from(value), count + 1));
    if count == 0 {
        return None;
    }
    Some(round_percent(sum as f64 / count as f64))
}
