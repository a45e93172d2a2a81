//! User account repository.
//!
//! # Invariants
//! - Emails are unique; duplicates surface as `RepoError::Conflict`.
//! - Password hashes are only readable through `find_credentials`.

use crate::model::{normalize_email, User, UserId, UserRole};
use crate::repo::{
    ensure_connection_ready, is_constraint, not_found, parse_enum, parse_optional_uuid,
    parse_uuid, EntityKind, RepoError, RepoResult,
};
use rusqlite::{ffi, params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT id, name, email, role, assigned_line_id FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &User, password_hash: &str) -> RepoResult<UserId>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Looks up by normalized email and returns the user with its hash.
    fn find_credentials(&self, email: &str) -> RepoResult<Option<(User, String)>>;
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
    fn count_admins(&self) -> RepoResult<u32>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User, password_hash: &str) -> RepoResult<UserId> {
        user.validate()?;
        self.conn
            .execute(
                "INSERT INTO users (id, name, email, role, assigned_line_id, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    user.email.as_str(),
                    user.role.as_str(),
                    user.assigned_line_id.map(|id| id.to_string()),
                    password_hash,
                ],
            )
            .map_err(|err| map_write_error(err, user))?;
        Ok(user.id)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET
                    name = ?1,
                    email = ?2,
                    role = ?3,
                    assigned_line_id = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?5;",
                params![
                    user.name.as_str(),
                    user.email.as_str(),
                    user.role.as_str(),
                    user.assigned_line_id.map(|id| id.to_string()),
                    user.id.to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, user))?;
        if changed == 0 {
            return Err(not_found(EntityKind::User, user.id));
        }
        Ok(())
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET password_hash = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2;",
            params![password_hash, id.to_string()],
        )?;
        if changed == 0 {
            return Err(not_found(EntityKind::User, id));
        }
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn find_credentials(&self, email: &str) -> RepoResult<Option<(User, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, role, assigned_line_id, password_hash
             FROM users
             WHERE email = ?1;",
        )?;
        let mut rows = stmt.query([normalize_email(email)])?;
        if let Some(row) = rows.next()? {
            let user = parse_user_row(row)?;
            let hash: String = row.get("password_hash")?;
            return Ok(Some((user, hash)));
        }
        Ok(None)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(EntityKind::User, id));
        }
        Ok(())
    }

    fn count_admins(&self) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1;",
            [UserRole::Admin.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_write_error(err: rusqlite::Error, user: &User) -> RepoError {
    if is_constraint(&err, ffi::SQLITE_CONSTRAINT_UNIQUE) {
        return RepoError::Conflict("email is already registered".to_string());
    }
    match user.assigned_line_id {
        Some(line_id) if is_constraint(&err, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
            not_found(EntityKind::Line, line_id)
        }
        _ => err.into(),
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let user = User {
        id: parse_uuid(&id_text, "users.id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role: parse_enum(&role_text, "users.role", UserRole::parse)?,
        assigned_line_id: parse_optional_uuid(
            row.get("assigned_line_id")?,
            "users.assigned_line_id",
        )?,
    };
    user.validate()?;
    Ok(user)
}
