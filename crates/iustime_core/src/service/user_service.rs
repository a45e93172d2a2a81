//! User accounts and authentication.
//!
//! # Responsibility
//! - Create and maintain accounts, hashing passwords with Argon2id.
//! - Turn valid credentials into a [`Session`].
//!
//! # Invariants
//! - At least one admin exists once the workspace is bootstrapped.
//! - Unknown emails and wrong passwords fail with the same error.
//! - Passwords and hashes are never logged.

use crate::model::{normalize_email, LineId, User, UserId, UserRole, ValidationError};
use crate::repo::line_repo::LineRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::EntityKind;
use crate::service::{missing, ServiceError, ServiceResult};
use crate::session::Session;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use uuid::Uuid;

const DEFAULT_ADMIN_NAME: &str = "Administrador";

/// Input for account creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub assigned_line_id: Option<LineId>,
}

pub struct UserService<U: UserRepository, L: LineRepository> {
    users: U,
    lines: L,
}

impl<U: UserRepository, L: LineRepository> UserService<U, L> {
    pub fn new(users: U, lines: L) -> Self {
        Self { users, lines }
    }

    pub fn create_user(&self, new_user: &NewUser) -> ServiceResult<User> {
        require_password(&new_user.password)?;
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.trim().to_string(),
            email: normalize_email(&new_user.email),
            role: new_user.role,
            assigned_line_id: new_user.assigned_line_id,
        };
        user.validate()?;
        self.check_assigned_line(&user)?;

        let hash = hash_password(&new_user.password)?;
        let id = self.users.create_user(&user, &hash)?;
        log::info!(
            "event=user_create module=service status=ok role={}",
            user.role.as_str()
        );
        self.read_back(id, "created user not found in read-back")
    }

    /// Updates profile fields. Demoting the last admin fails with `LastAdmin`.
    pub fn update_user(&self, user: &User) -> ServiceResult<User> {
        let mut user = user.clone();
        user.name = user.name.trim().to_string();
        user.email = normalize_email(&user.email);
        user.validate()?;

        let current = self.get_user(user.id)?;
        if current.is_admin() && !user.is_admin() {
            self.ensure_other_admin()?;
        }
        self.check_assigned_line(&user)?;

        self.users.update_user(&user)?;
        self.read_back(user.id, "updated user not found in read-back")
    }

    pub fn set_password(&self, id: UserId, password: &str) -> ServiceResult<()> {
        require_password(password)?;
        let hash = hash_password(password)?;
        self.users.set_password_hash(id, &hash)?;
        log::info!("event=user_password_set module=service status=ok");
        Ok(())
    }

    /// Deletes an account. The last admin cannot be removed.
    pub fn delete_user(&self, id: UserId) -> ServiceResult<()> {
        let current = self.get_user(id)?;
        if current.is_admin() {
            self.ensure_other_admin()?;
        }
        self.users.delete_user(id)?;
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.users
            .get_user(id)?
            .ok_or_else(|| missing(EntityKind::User, id))
    }

    /// Lists accounts filtered by name or email.
    pub fn list_users(&self, search: Option<&str>) -> ServiceResult<Vec<User>> {
        let term = search.unwrap_or_default();
        Ok(self
            .users
            .list_users()?
            .into_iter()
            .filter(|user| user.matches_search(term))
            .collect())
    }

    /// Verifies credentials. Email matching ignores case and surrounding
    /// whitespace.
    pub fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let Some((user, hash)) = self.users.find_credentials(email)? else {
            log::warn!("event=login module=service status=error reason=unknown_email");
            return Err(ServiceError::InvalidCredentials);
        };
        if !verify_password(password, &hash) {
            log::warn!("event=login module=service status=error reason=bad_password");
            return Err(ServiceError::InvalidCredentials);
        }
        log::info!(
            "event=login module=service status=ok role={}",
            user.role.as_str()
        );
        Ok(Session::new(user))
    }

    /// Seeds an admin account when no user exists yet.
    ///
    /// Returns the created admin, or `None` when accounts already exist.
    pub fn ensure_default_admin(&self, email: &str, password: &str) -> ServiceResult<Option<User>> {
        if !self.users.list_users()?.is_empty() {
            return Ok(None);
        }
        let admin = self.create_user(&NewUser {
            name: DEFAULT_ADMIN_NAME.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: UserRole::Admin,
            assigned_line_id: None,
        })?;
        log::info!("event=bootstrap_admin module=service status=ok");
        Ok(Some(admin))
    }

    fn ensure_other_admin(&self) -> ServiceResult<()> {
        if self.users.count_admins()? <= 1 {
            return Err(ServiceError::LastAdmin);
        }
        Ok(())
    }

    fn check_assigned_line(&self, user: &User) -> ServiceResult<()> {
        if let Some(line_id) = user.assigned_line_id {
            if self.lines.get_line(line_id)?.is_none() {
                return Err(missing(EntityKind::Line, line_id));
            }
        }
        Ok(())
    }

    fn read_back(&self, id: UserId, details: &'static str) -> ServiceResult<User> {
        self.users
            .get_user(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}

fn require_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::BlankField("password"));
    }
    Ok(())
}

/// Argon2id PHC string with a fresh random salt.
fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::PasswordHash(err.to_string()))
}

/// A malformed stored hash never verifies.
fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("s3cret").unwrap();
        let second = hash_password("s3cret").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &first));
        assert!(!verify_password("S3cret", &first));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("", ""));
    }
}
