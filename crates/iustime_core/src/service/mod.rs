//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce cross-record rules that a single row cannot express
//!   (subtask depth, same-line links, progress roll-up, last admin).
//!
//! # Invariants
//! - Services never see SQL; they only talk to repository traits.
//! - Every write returns the stored record as read back from the repository.

use crate::model::{LineId, ValidationError};
use crate::repo::{EntityKind, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod line_service;
pub mod project_service;
pub mod review_service;
pub mod risk_service;
pub mod task_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error shared by every use-case service.
#[derive(Debug)]
pub enum ServiceError {
    /// Record failed validation.
    Validation(ValidationError),
    /// Referenced record does not exist.
    NotFound { kind: EntityKind, id: Uuid },
    /// Write collides with existing state (duplicate email, assigned users).
    Conflict(String),
    /// Subtask placement breaks the one-level nesting rules.
    InvalidParent(String),
    /// Linked records live in different lines.
    LineMismatch { expected: LineId, actual: LineId },
    /// Task cannot leave its line while risks still point at it.
    LinkedRisks { task_id: Uuid, count: usize },
    /// Operation would leave the workspace without an admin.
    LastAdmin,
    /// Unknown email or wrong password.
    InvalidCredentials,
    /// Password hashing backend failure.
    PasswordHash(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidParent(message) => write!(f, "invalid parent task: {message}"),
            Self::LineMismatch { expected, actual } => {
                write!(f, "record belongs to line {actual}, expected line {expected}")
            }
            Self::LinkedRisks { task_id, count } => write!(
                f,
                "task {task_id} has {count} linked risk(s); unlink them before changing its line"
            ),
            Self::LastAdmin => write!(f, "at least one admin must remain"),
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::PasswordHash(message) => write!(f, "password hashing failed: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub(crate) fn missing(kind: EntityKind, id: Uuid) -> ServiceError {
    ServiceError::NotFound { kind, id }
}
