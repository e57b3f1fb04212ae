//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over the `users` table, keeping the password hash out of [`User`].
//!
//! # Invariants
//! - `username` matches case-sensitively; emails match case-insensitively
//!   against both the primary and the secondary address.

use crate::model::user::{NewUser, ProfileUpdate, User, UserId};
use crate::repo::{bool_to_int, expect_row, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    first_name,
    last_name,
    is_active,
    verified,
    archived,
    secondary_email,
    date_joined,
    last_login
FROM users";

const ENTITY: &str = "user";

/// Repository interface for account persistence.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser, joined_at: i64) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Looks up by primary or secondary email.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Lists every account in id order.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn password_hash(&self, id: UserId) -> RepoResult<Option<String>>;
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    fn record_login(&self, id: UserId, at: i64) -> RepoResult<()>;
    fn set_verified(&self, id: UserId, verified: bool) -> RepoResult<()>;
    fn set_archived(&self, id: UserId, archived: bool) -> RepoResult<()>;
    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()>;
    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User>;
    fn set_secondary_email(&self, id: UserId, email: Option<&str>) -> RepoResult<()>;
    /// Exchanges primary and secondary email in one statement.
    ///
    /// Returns `false` when the user has no secondary email.
    fn swap_emails(&self, id: UserId) -> RepoResult<bool>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, filter: &str, value: &dyn rusqlite::ToSql) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{USER_SELECT_SQL} WHERE {filter};"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn set_flag(&self, id: UserId, column: &str, value: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("UPDATE users SET {column} = ?1 WHERE id = ?2;"),
            params![bool_to_int(value), id],
        )?;
        expect_row(changed, ENTITY, id)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser, joined_at: i64) -> RepoResult<User> {
        self.conn.execute(
            "INSERT INTO users (username, email, password_hash, date_joined)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                user.username.as_str(),
                user.email.as_str(),
                user.password_hash.as_str(),
                joined_at
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        self.get_user(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted user {id} missing on read-back"))
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.query_one("id = ?1", &id)
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.query_one("username = ?1", &username)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.query_one("email = ?1 OR secondary_email = ?1", &email)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn password_hash(&self, id: UserId) -> RepoResult<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1;",
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(hash)
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2;",
            params![password_hash, id],
        )?;
        expect_row(changed, ENTITY, id)
    }

    fn record_login(&self, id: UserId, at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2;",
            params![at, id],
        )?;
        expect_row(changed, ENTITY, id)
    }

    fn set_verified(&self, id: UserId, verified: bool) -> RepoResult<()> {
        self.set_flag(id, "verified", verified)
    }

    fn set_archived(&self, id: UserId, archived: bool) -> RepoResult<()> {
        self.set_flag(id, "archived", archived)
    }

    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()> {
        self.set_flag(id, "is_active", active)
    }

    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                first_name = COALESCE(?1, first_name),
                last_name = COALESCE(?2, last_name)
             WHERE id = ?3;",
            params![update.first_name.as_deref(), update.last_name.as_deref(), id],
        )?;
        expect_row(changed, ENTITY, id)?;

        self.get_user(id)?
            .ok_or(RepoError::NotFound { entity: ENTITY, id })
    }

    fn set_secondary_email(&self, id: UserId, email: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET secondary_email = ?1 WHERE id = ?2;",
            params![email, id],
        )?;
        expect_row(changed, ENTITY, id)
    }

    fn swap_emails(&self, id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                email = secondary_email,
                secondary_email = email
             WHERE id = ?1 AND secondary_email IS NOT NULL;",
            [id],
        )?;
        Ok(changed > 0)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        is_active: int_to_bool(row.get("is_active")?, "users.is_active")?,
        verified: int_to_bool(row.get("verified")?, "users.verified")?,
        archived: int_to_bool(row.get("archived")?, "users.archived")?,
        secondary_email: row.get("secondary_email")?,
        date_joined: row.get("date_joined")?,
        last_login: row.get("last_login")?,
    })
}
