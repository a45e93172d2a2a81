//! User account model. Credentials live only in storage, never here.

use crate::model::common::{require_text, text_matches, UserRole, ValidationError};
use crate::model::line::LineId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Always stored normalized, see [`normalize_email`].
    pub email: String,
    pub role: UserRole,
    /// Required for `UserRole::User`, absent for admins.
    pub assigned_line_id: Option<LineId>,
}

impl User {
    pub fn admin(name: impl Into<String>, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(email),
            role: UserRole::Admin,
            assigned_line_id: None,
        }
    }

    pub fn member(name: impl Into<String>, email: &str, line_id: LineId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(email),
            role: UserRole::User,
            assigned_line_id: Some(line_id),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text(&self.name, "name")?;
        if !EMAIL_RE.is_match(&self.email) || self.email != normalize_email(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        match (self.role, self.assigned_line_id) {
            (UserRole::User, None) => Err(ValidationError::MissingAssignedLine),
            (UserRole::Admin, Some(_)) => Err(ValidationError::UnexpectedAssignedLine),
            _ => Ok(()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn matches_search(&self, term: &str) -> bool {
        text_matches(term, &[&self.name, &self.email])
    }
}

/// Trims and lower-cases an email so lookups are case-insensitive.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}
