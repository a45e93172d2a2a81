//! Domain model for work lines and everything scoped to them.
//!
//! # Responsibility
//! - Define canonical records for lines, projects, tasks, risks, reviews
//!   and users.
//! - Own record-level validation shared by every write path.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - `validate()` is the single definition of a well-formed record.

pub mod common;
pub mod line;
pub mod project;
pub mod review;
pub mod risk;
pub mod task;
pub mod user;

pub use common::{
    mean_percent, round_percent, text_matches, Level, ParseEnumError, RiskStatus, UserRole,
    ValidationError, WorkStatus,
};
pub use line::{LineId, WorkLine};
pub use project::{Project, ProjectId};
pub use review::{GlobalReview, MonthlyReview, ReviewId, ReviewMonth};
pub use risk::{Risk, RiskId};
pub use task::{Attachment, ChecklistItem, Task, TaskId};
pub use user::{normalize_email, User, UserId};

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
