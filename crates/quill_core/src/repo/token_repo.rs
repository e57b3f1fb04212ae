//! Token repository: server-side session tokens and single-use action tokens.
//!
//! # Invariants
//! - Revocation and consumption are conditional updates; a token is revoked
//!   or consumed at most once, even under concurrent requests.

use crate::model::token::{AccountAction, ActionToken, AuthToken, AuthTokenKind};
use crate::model::user::UserId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for issued credentials.
pub trait TokenRepository {
    fn insert_auth_token(&self, token: &AuthToken) -> RepoResult<()>;
    fn get_auth_token(&self, token: &str) -> RepoResult<Option<AuthToken>>;
    /// Returns `false` when the token is unknown or already revoked.
    fn revoke_auth_token(&self, token: &str, at: i64) -> RepoResult<bool>;
    /// Revokes every unrevoked token of `user_id`; returns how many.
    fn revoke_user_tokens(&self, user_id: UserId, at: i64) -> RepoResult<usize>;
    fn insert_action_token(&self, token: &ActionToken) -> RepoResult<()>;
    fn get_action_token(&self, token: &str) -> RepoResult<Option<ActionToken>>;
    /// Returns `false` when the token is unknown or already consumed.
    fn consume_action_token(&self, token: &str, at: i64) -> RepoResult<bool>;
    /// Deletes auth and action tokens whose deadline passed before `now`.
    fn purge_expired(&self, now: i64) -> RepoResult<usize>;
}

/// SQLite-backed token repository.
pub struct SqliteTokenRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTokenRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TokenRepository for SqliteTokenRepository<'_> {
    fn insert_auth_token(&self, token: &AuthToken) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO auth_tokens (token, kind, user_id, created_at, expires_at, revoked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                token.token.as_str(),
                token.kind.as_str(),
                token.user_id,
                token.created_at,
                token.expires_at,
                token.revoked_at
            ],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, token: &str) -> RepoResult<Option<AuthToken>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT token, kind, user_id, created_at, expires_at, revoked_at
             FROM auth_tokens
             WHERE token = ?1;",
        )?;
        let mut rows = stmt.query([token])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_auth_token_row(row)?)),
            None => Ok(None),
        }
    }

    fn revoke_auth_token(&self, token: &str, at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE auth_tokens SET revoked_at = ?1 WHERE token = ?2 AND revoked_at IS NULL;",
            params![at, token],
        )?;
        Ok(changed > 0)
    }

    fn revoke_user_tokens(&self, user_id: UserId, at: i64) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE auth_tokens SET revoked_at = ?1 WHERE user_id = ?2 AND revoked_at IS NULL;",
            params![at, user_id],
        )?;
        Ok(changed)
    }

    fn insert_action_token(&self, token: &ActionToken) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO action_tokens (
                token,
                action,
                user_id,
                payload,
                created_at,
                expires_at,
                consumed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                token.token.as_str(),
                token.action.as_str(),
                token.user_id,
                token.payload.as_deref(),
                token.created_at,
                token.expires_at,
                token.consumed_at
            ],
        )?;
        Ok(())
    }

    fn get_action_token(&self, token: &str) -> RepoResult<Option<ActionToken>> {
        let row = self
            .conn
            .query_row(
                "SELECT token, action, user_id, payload, created_at, expires_at, consumed_at
                 FROM action_tokens
                 WHERE token = ?1;",
                [token],
                |row| {
                    Ok((
                        row.get::<_, String>("token")?,
                        row.get::<_, String>("action")?,
                        row.get::<_, UserId>("user_id")?,
                        row.get::<_, Option<String>>("payload")?,
                        row.get::<_, i64>("created_at")?,
                        row.get::<_, i64>("expires_at")?,
                        row.get::<_, Option<i64>>("consumed_at")?,
                    ))
                },
            )
            .optional()?;

        let Some((token, action, user_id, payload, created_at, expires_at, consumed_at)) = row
        else {
            return Ok(None);
        };
        let action = AccountAction::parse(&action).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid action `{action}` in action_tokens.action"))
        })?;

        Ok(Some(ActionToken {
            token,
            action,
            user_id,
            payload,
            created_at,
            expires_at,
            consumed_at,
        }))
    }

    fn consume_action_token(&self, token: &str, at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE action_tokens SET consumed_at = ?1 WHERE token = ?2 AND consumed_at IS NULL;",
            params![at, token],
        )?;
        Ok(changed > 0)
    }

    fn purge_expired(&self, now: i64) -> RepoResult<usize> {
        let auth = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE expires_at <= ?1;", [now])?;
        let action = self
            .conn
            .execute("DELETE FROM action_tokens WHERE expires_at <= ?1;", [now])?;
        Ok(auth + action)
    }
}

fn parse_auth_token_row(row: &Row<'_>) -> RepoResult<AuthToken> {
    let kind_text: String = row.get("kind")?;
    let kind = AuthTokenKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid token kind `{kind_text}` in auth_tokens.kind"))
    })?;

    Ok(AuthToken {
        token: row.get("token")?,
        kind,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        revoked_at: row.get("revoked_at")?,
    })
}
