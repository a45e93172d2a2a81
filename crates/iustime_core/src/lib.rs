//! Core domain logic for IusTime, a multi-line project, task and risk
//! tracker with monthly reviews.
//! This crate is the single source of truth for business invariants.

pub mod ai;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod timeline;
pub mod workspace;

pub use ai::{
    AiSettings, DraftOrigin, GeminiReviewGenerator, OfflineReviewGenerator, ReportLanguage,
    ReviewGenerator,
};
pub use config::{AdminCredentials, ConfigError, CoreConfig};
pub use dashboard::{GlobalDashboard, LineDashboard};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{
    Attachment, ChecklistItem, GlobalReview, Level, LineId, MonthlyReview, Project, ProjectId,
    ReviewMonth, Risk, RiskId, RiskStatus, Task, TaskId, User, UserId, UserRole,
    ValidationError, WorkLine, WorkStatus,
};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::review_service::Generated;
pub use service::task_service::{ProjectTaskGroup, TaskNode};
pub use service::user_service::NewUser;
pub use service::{ServiceError, ServiceResult};
pub use session::{AccessError, LineScope, Session};
pub use snapshot::{SnapshotError, StateSnapshot, SNAPSHOT_VERSION};
pub use timeline::{TimelineBar, TimelineRow, TimelineWindow};
pub use workspace::{Workspace, WorkspaceError, WorkspaceResult, DEFAULT_LINE_NAME};

