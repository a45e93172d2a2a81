//! Authenticated session and line-scoped access checks.
//!
//! # Invariants
//! - Admins see every line; standard users only their assigned line.
//! - A session can only be obtained through a successful login.

use crate::model::{LineId, User, UserRole};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lines a session may read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "line_id", rename_all = "snake_case")]
pub enum LineScope {
    All,
    Single(LineId),
}

impl LineScope {
    pub fn allows(self, line_id: LineId) -> bool {
        match self {
            Self::All => true,
            Self::Single(assigned) => assigned == line_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    LineForbidden { line_id: LineId },
    AdminRequired,
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineForbidden { line_id } => write!(f, "access to line {line_id} is not allowed"),
            Self::AdminRequired => write!(f, "operation requires an admin account"),
        }
    }
}

impl Error for AccessError {}

/// Logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    user: User,
}

impl Session {
    pub(crate) fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn scope(&self) -> LineScope {
        match (self.user.role, self.user.assigned_line_id) {
            (UserRole::Admin, _) => LineScope::All,
            (UserRole::User, Some(line_id)) => LineScope::Single(line_id),
            // Rejected by validation; treat as no access at all.
            (UserRole::User, None) => LineScope::Single(LineId::nil()),
        }
    }

    pub fn authorize_line(&self, line_id: LineId) -> Result<(), AccessError> {
        if self.scope().allows(line_id) {
            Ok(())
        } else {
            Err(AccessError::LineForbidden { line_id })
        }
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::AdminRequired)
        }
    }

    /// Line opened right after login; admins pick one themselves.
    pub fn default_line(&self) -> Option<LineId> {
        match self.scope() {
            LineScope::All => None,
            LineScope::Single(line_id) => Some(line_id),
        }
    }
}
