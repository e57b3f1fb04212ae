//! Shared application state handed to every request.
//!
//! # Invariants
//! - The connection lock is taken inside synchronous closures only and is
//!   never held across an `.await`.
//! - Auth and account operations run in one transaction each; an error
//!   rolls back every write the operation made.
//! - Password hashing and verification run on a blocking worker before the
//!   connection lock is taken; see [`AppState::prepare_passwords`].

use parking_lot::Mutex;
use quill_core::auth::password::{
    Bcrypt, PasswordHashError, PasswordHasher, PreparedPasswords, MAX_PASSWORD_BYTES,
};
use quill_core::repo::post_repo::SqliteBlogPostRepository;
use quill_core::repo::token_repo::SqliteTokenRepository;
use quill_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use quill_core::repo::RepoError;
use quill_core::service::account_service::AccountService;
use quill_core::service::auth_service::AuthService;
use quill_core::service::mail::Mailer;
use quill_core::service::post_service::BlogPostService;
use quill_core::service::user_service::UserService;
use quill_core::{AuthConfig, Caller, ServiceResult, UserId};
use rusqlite::Connection;
use std::sync::Arc;

pub type SharedMailer = Arc<dyn Mailer + Send + Sync>;
pub type SharedHasher = Arc<dyn PasswordHasher + Send + Sync>;
pub type Passwords = PreparedPasswords<SharedHasher>;

pub type Posts<'conn> = BlogPostService<SqliteBlogPostRepository<'conn>>;
pub type Users<'conn> = UserService<SqliteUserRepository<'conn>>;
pub type Auth<'conn> =
    AuthService<SqliteUserRepository<'conn>, SqliteTokenRepository<'conn>, Passwords>;
pub type Accounts<'conn> = AccountService<
    SqliteUserRepository<'conn>,
    SqliteTokenRepository<'conn>,
    SharedMailer,
    Passwords,
>;

/// Whose stored hash a password is checked against.
#[derive(Debug, Clone, Copy)]
pub enum HashOwner<'a> {
    Username(&'a str),
    User(UserId),
}

/// Password work a request needs done before it touches storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordWork<'a> {
    check: Option<(HashOwner<'a>, &'a str)>,
    hash: Option<&'a str>,
}

impl<'a> PasswordWork<'a> {
    /// Verify `raw` against the hash stored for `owner`.
    pub fn check(owner: HashOwner<'a>, raw: &'a str) -> Self {
        Self {
            check: Some((owner, raw)),
            hash: None,
        }
    }

    /// Hash a new password once both entries agree.
    pub fn hash(password1: &'a str, password2: &'a str) -> Self {
        Self::default().and_hash(password1, password2)
    }

    pub fn and_hash(mut self, password1: &'a str, password2: &'a str) -> Self {
        // Mismatched or over-long input fails validation and is never hashed.
        if password1 == password2 && password1.len() <= MAX_PASSWORD_BYTES {
            self.hash = Some(password1);
        }
        self
    }
}

#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
    auth: Arc<AuthConfig>,
    mailer: SharedMailer,
    hasher: SharedHasher,
}

impl AppState {
    pub fn new(conn: Connection, auth: AuthConfig, mailer: SharedMailer) -> Self {
        let hasher: SharedHasher = Arc::new(Bcrypt {
            cost: auth.password_hash_cost,
        });
        Self {
            conn: Arc::new(Mutex::new(conn)),
            auth: Arc::new(auth),
            mailer,
            hasher,
        }
    }

    /// Replaces the bcrypt backend.
    pub fn with_password_hasher(mut self, hasher: SharedHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Runs `work` on a blocking worker. The connection lock is held only
    /// while the stored hash is read.
    pub async fn prepare_passwords(&self, work: PasswordWork<'_>) -> ServiceResult<Passwords> {
        let check = match work.check {
            Some((owner, raw)) => self
                .stored_hash(owner)?
                .map(|hash| (raw.to_owned(), hash)),
            None => None,
        };
        let hash = work.hash.map(str::to_owned);
        let mut passwords = PreparedPasswords::new(Arc::clone(&self.hasher));
        if check.is_none() && hash.is_none() {
            return Ok(passwords);
        }

        let prepared = tokio::task::spawn_blocking(move || {
            if let Some((raw, stored)) = check {
                passwords.prepare_check(&raw, &stored);
            }
            if let Some(raw) = hash {
                passwords.prepare_hash(&raw)?;
            }
            Ok::<_, PasswordHashError>(passwords)
        })
        .await
        .map_err(|err| PasswordHashError::Interrupted(err.to_string()))??;
        Ok(prepared)
    }

    fn stored_hash(&self, owner: HashOwner<'_>) -> ServiceResult<Option<String>> {
        let conn = self.conn.lock();
        let users = SqliteUserRepository::new(&conn);
        let id = match owner {
            HashOwner::User(id) => id,
            HashOwner::Username(username) => match users.find_by_username(username)? {
                Some(user) => user.id,
                None => return Ok(None),
            },
        };
        Ok(users.password_hash(id)?)
    }

    pub fn with_posts<T>(
        &self,
        f: impl FnOnce(&mut Posts<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut conn = self.conn.lock();
        let mut service = BlogPostService::new(SqliteBlogPostRepository::new(&mut conn));
        f(&mut service)
    }

    pub fn with_users<T>(
        &self,
        f: impl FnOnce(&Users<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let conn = self.conn.lock();
        let service = UserService::new(SqliteUserRepository::new(&conn));
        f(&service)
    }

    pub fn with_auth<T>(
        &self,
        f: impl FnOnce(&Auth<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.with_auth_using(self.unprepared(), f)
    }

    /// Like [`AppState::with_auth`], serving password work from `passwords`.
    pub fn with_auth_using<T>(
        &self,
        passwords: Passwords,
        f: impl FnOnce(&Auth<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.in_transaction(|tx| {
            let service = AuthService::with_hasher(
                SqliteUserRepository::new(tx),
                SqliteTokenRepository::new(tx),
                passwords,
                AuthConfig::clone(&self.auth),
            );
            f(&service)
        })
    }

    pub fn with_accounts<T>(
        &self,
        f: impl FnOnce(&Accounts<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.with_accounts_using(self.unprepared(), f)
    }

    /// Like [`AppState::with_accounts`], serving password work from `passwords`.
    pub fn with_accounts_using<T>(
        &self,
        passwords: Passwords,
        f: impl FnOnce(&Accounts<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.in_transaction(|tx| {
            let service = AccountService::with_hasher(
                SqliteUserRepository::new(tx),
                SqliteTokenRepository::new(tx),
                Arc::clone(&self.mailer),
                passwords,
                AuthConfig::clone(&self.auth),
            );
            f(&service)
        })
    }

    fn unprepared(&self) -> Passwords {
        PreparedPasswords::new(Arc::clone(&self.hasher))
    }

    /// Commits only when `f` succeeds.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(RepoError::from)?;
        let result = f(&tx);
        if result.is_ok() {
            tx.commit().map_err(RepoError::from)?;
        }
        result
    }

    /// Resolves a presented access token into its caller.
    pub fn resolve_caller(&self, token: &str) -> ServiceResult<Option<Caller>> {
        self.with_auth(|auth| auth.authenticate(token))
    }

    /// Removes expired tokens. Called once at startup.
    pub fn purge_expired_tokens(&self) -> ServiceResult<usize> {
        self.with_auth(|auth| auth.purge_expired())
    }
}
