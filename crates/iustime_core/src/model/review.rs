//! Monthly narrative reviews.
//!
//! # Responsibility
//! - Define the per-line monthly review and the cross-line global review.
//! - Own the `YYYY-MM` month key used by both.
//!
//! # Invariants
//! - One monthly review per `(line_id, month)`.
//! - One global review per month.

use crate::model::common::ValidationError;
use crate::model::line::LineId;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub type ReviewId = Uuid;

static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid month regex"));

/// Calendar month key, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReviewMonth {
    year: i32,
    month: u32,
}

impl ReviewMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(ValidationError::InvalidMonth(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for ReviewMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let caps = MONTH_RE
            .captures(trimmed)
            .ok_or_else(|| ValidationError::InvalidMonth(trimmed.to_string()))?;
        let year = caps[1]
            .parse::<i32>()
            .map_err(|_| ValidationError::InvalidMonth(trimmed.to_string()))?;
        let month = caps[2]
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidMonth(trimmed.to_string()))?;
        Self::new(year, month).map_err(|_| ValidationError::InvalidMonth(trimmed.to_string()))
    }
}

impl TryFrom<String> for ReviewMonth {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReviewMonth> for String {
    fn from(value: ReviewMonth) -> Self {
        value.to_string()
    }
}

impl Display for ReviewMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Per-line monthly report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReview {
    pub id: ReviewId,
    pub line_id: LineId,
    pub month: ReviewMonth,
    pub summary: String,
    pub achievements: String,
    pub issues: String,
    pub next_steps: String,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl MonthlyReview {
    /// Empty review for a line and month.
    pub fn blank(line_id: LineId, month: ReviewMonth) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_id,
            month,
            summary: String::new(),
            achievements: String::new(),
            issues: String::new(),
            next_steps: String::new(),
            updated_at: super::now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_timestamp(self.updated_at, "updated_at")
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.summary,
            &self.achievements,
            &self.issues,
            &self.next_steps,
        ]
        .iter()
        .all(|section| section.trim().is_empty())
    }
}

/// Organization-wide monthly report written by admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalReview {
    pub month: ReviewMonth,
    pub vision: String,
    pub milestones: String,
    pub attention_areas: String,
    pub strategy: String,
    /// Unix epoch milliseconds.
    pub last_updated: i64,
}

impl GlobalReview {
    pub fn blank(month: ReviewMonth) -> Self {
        Self {
            month,
            vision: String::new(),
            milestones: String::new(),
            attention_areas: String::new(),
            strategy: String::new(),
            last_updated: super::now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_timestamp(self.last_updated, "last_updated")
    }
}

fn require_timestamp(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeTimestamp(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{GlobalReview, MonthlyReview, ReviewMonth};
    use crate::model::ValidationError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn month_parses_and_displays_round_trip() {
        let month: ReviewMonth = "2025-03".parse().unwrap();
        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 3);
        assert_eq!(month.to_string(), "2025-03");
    }

    #[test]
    fn month_rejects_bad_shapes() {
        for raw in ["2025-13", "2025-00", "25-03", "2025/03", "", "2025-3"] {
            assert!(raw.parse::<ReviewMonth>().is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn month_bounds_handle_year_end_and_leap_years() {
        let december: ReviewMonth = "2024-12".parse().unwrap();
        assert_eq!(december.next().to_string(), "2025-01");
        assert_eq!(
            december.last_day(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );

        let february: ReviewMonth = "2024-02".parse().unwrap();
        assert_eq!(
            february.last_day(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(february.contains(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()));
        assert!(!february.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn month_serializes_as_string() {
        let month: ReviewMonth = "2025-07".parse().unwrap();
        assert_eq!(serde_json::to_string(&month).unwrap(), "\"2025-07\"");
        let back: ReviewMonth = serde_json::from_str("\"2025-07\"").unwrap();
        assert_eq!(back, month);
        assert!(serde_json::from_str::<ReviewMonth>("\"July\"").is_err());
    }

    #[test]
    fn reviews_reject_negative_timestamps() {
        let month: ReviewMonth = "2025-07".parse().unwrap();
        let mut monthly = MonthlyReview::blank(Uuid::new_v4(), month);
        assert!(monthly.validate().is_ok());
        monthly.updated_at = -1;
        assert_eq!(
            monthly.validate(),
            Err(ValidationError::NegativeTimestamp("updated_at"))
        );

        let mut global = GlobalReview::blank(month);
        global.last_updated = -5;
        assert_eq!(
            global.validate(),
            Err(ValidationError::NegativeTimestamp("last_updated"))
        );
    }
}
