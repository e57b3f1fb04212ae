//! Session token use-cases: sign-in, token resolution, refresh and revocation.
//!
//! # Responsibility
//! - Turn credentials into server-side access/refresh token pairs.
//! - Resolve a presented access token into a [`Caller`].
//!
//! # Invariants
//! - Unknown user, wrong password and inactive account are indistinguishable
//!   to the client (`InvalidCredentials`).
//! - Only `tokenAuth` unarchives an account or applies the unverified-login
//!   policy; plain `login` checks credentials and issues a token.
//! - A refresh token is rotated by a conditional revoke, so it can be
//!   exchanged at most once.
//! - Tokens of archived or inactive users never resolve to a caller.

use crate::auth::password::{Bcrypt, PasswordHasher};
use crate::auth::token::{generate_token, looks_like_token};
use crate::auth::Caller;
use crate::clock::{deadline_after, now_epoch_ms};
use crate::config::AuthConfig;
use crate::model::token::{AuthToken, AuthTokenKind};
use crate::model::user::{User, UserId};
use crate::repo::token_repo::TokenRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoResult;
use crate::service::error::{FieldError, ServiceError, ServiceResult};
use log::{info, warn};

/// Freshly issued credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    /// Access token deadline, epoch milliseconds.
    pub expires_at: i64,
    pub refresh_expires_at: i64,
}

/// Result of `tokenAuth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAuthOutcome {
    pub tokens: TokenPair,
    pub user: User,
    /// Set when this sign-in brought the account back from the archive.
    pub unarchiving: bool,
}

/// Public claims of a live access token. Times are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub username: String,
    pub exp: i64,
    pub orig_iat: i64,
}

/// Result of a refresh-token rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRefreshOutcome {
    pub tokens: TokenPair,
    pub payload: TokenPayload,
}

/// Which sign-in flow is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignIn {
    /// `login`: credentials only.
    Plain,
    /// `tokenAuth`: also unverified-login policy and unarchiving.
    TokenAuth,
}

pub struct AuthService<U: UserRepository, T: TokenRepository, P: PasswordHasher = Bcrypt> {
    users: U,
    tokens: T,
    passwords: P,
    config: AuthConfig,
}

impl<U: UserRepository, T: TokenRepository> AuthService<U, T> {
    /// Service hashing with bcrypt at `config.password_hash_cost`.
    pub fn new(users: U, tokens: T, config: AuthConfig) -> Self {
        let passwords = Bcrypt {
            cost: config.password_hash_cost,
        };
        Self::with_hasher(users, tokens, passwords, config)
    }
}

impl<U: UserRepository, T: TokenRepository, P: PasswordHasher> AuthService<U, T, P> {
    pub fn with_hasher(users: U, tokens: T, passwords: P, config: AuthConfig) -> Self {
        Self {
            users,
            tokens,
            passwords,
            config,
        }
    }

    /// Plain `login`: checks credentials and returns one access token.
    ///
    /// An archived account still receives a token, but it resolves to no
    /// caller until `tokenAuth` unarchives the account.
    pub fn login(&self, username: &str, password: &str) -> ServiceResult<String> {
        let (user, _) = self.sign_in(username, password, SignIn::Plain)?;
        let now = now_epoch_ms();
        let access = issue_token(
            &self.tokens,
            user.id,
            AuthTokenKind::Access,
            now,
            &self.config,
        )?;
        info!(
            "event=auth_login module=service status=ok user_id={}",
            user.id
        );
        Ok(access.token)
    }

    /// `tokenAuth`: checks credentials and returns an access/refresh pair.
    pub fn token_auth(&self, username: &str, password: &str) -> ServiceResult<TokenAuthOutcome> {
        let (user, unarchiving) = self.sign_in(username, password, SignIn::TokenAuth)?;
        let tokens = issue_token_pair(&self.tokens, user.id, now_epoch_ms(), &self.config)?;
        info!(
            "event=auth_token module=service status=ok user_id={} unarchiving={unarchiving}",
            user.id
        );
        Ok(TokenAuthOutcome {
            tokens,
            user,
            unarchiving,
        })
    }

    /// Resolves an access token into the caller it was issued to.
    ///
    /// Returns `Ok(None)` for anything that is not a live access token of an
    /// active, unarchived account.
    pub fn authenticate(&self, token: &str) -> ServiceResult<Option<Caller>> {
        if !looks_like_token(token) {
            return Ok(None);
        }
        let Some(record) = self.tokens.get_auth_token(token)? else {
            return Ok(None);
        };
        if record.kind != AuthTokenKind::Access || !record.is_live(now_epoch_ms()) {
            return Ok(None);
        }

        Ok(self
            .users
            .get_user(record.user_id)?
            .filter(User::can_authenticate)
            .map(|user| Caller::from(&user)))
    }

    /// `verifyToken`: claims of a live access token.
    pub fn verify_token(&self, token: &str) -> ServiceResult<TokenPayload> {
        let record = self.live_auth_token(token, AuthTokenKind::Access, now_epoch_ms())?;
        let user = self.token_owner(&record)?;
        Ok(payload_for(&user, &record))
    }

    /// `refreshToken`: exchanges a refresh token for a new pair.
    pub fn refresh_token(&self, refresh_token: &str) -> ServiceResult<TokenRefreshOutcome> {
        let now = now_epoch_ms();
        let record = self.live_auth_token(refresh_token, AuthTokenKind::Refresh, now)?;
        let user = self.token_owner(&record)?;

        if !self.tokens.revoke_auth_token(&record.token, now)? {
            warn!(
                "event=auth_refresh module=service status=error error_code=refresh_reused user_id={}",
                user.id
            );
            return Err(ServiceError::validation(FieldError::invalid_token()));
        }

        let tokens = issue_token_pair(&self.tokens, user.id, now, &self.config)?;
        let payload = TokenPayload {
            username: user.username.clone(),
            exp: tokens.expires_at / 1000,
            orig_iat: now / 1000,
        };
        info!(
            "event=auth_refresh module=service status=ok user_id={}",
            user.id
        );
        Ok(TokenRefreshOutcome { tokens, payload })
    }

    /// `revokeToken`: revokes a refresh token; returns the revocation time in
    /// epoch seconds.
    pub fn revoke_token(&self, refresh_token: &str) -> ServiceResult<i64> {
        let invalid = || ServiceError::validation(FieldError::invalid_token());
        if !looks_like_token(refresh_token) {
            return Err(invalid());
        }
        let record = self.tokens.get_auth_token(refresh_token)?.ok_or_else(invalid)?;
        if record.kind != AuthTokenKind::Refresh {
            return Err(invalid());
        }

        let now = now_epoch_ms();
        if !self.tokens.revoke_auth_token(&record.token, now)? {
            return Err(invalid());
        }
        info!(
            "event=auth_revoke module=service status=ok user_id={}",
            record.user_id
        );
        Ok(now / 1000)
    }

    /// Drops expired auth and action tokens; returns how many.
    pub fn purge_expired(&self) -> ServiceResult<usize> {
        let purged = self.tokens.purge_expired(now_epoch_ms())?;
        info!("event=token_purge module=service status=ok purged={purged}");
        Ok(purged)
    }

    fn live_auth_token(
        &self,
        token: &str,
        kind: AuthTokenKind,
        now: i64,
    ) -> ServiceResult<AuthToken> {
        let invalid = || ServiceError::validation(FieldError::invalid_token());
        if !looks_like_token(token) {
            return Err(invalid());
        }
        let record = self.tokens.get_auth_token(token)?.ok_or_else(invalid)?;
        if record.kind != kind || record.revoked_at.is_some() {
            return Err(invalid());
        }
        if now >= record.expires_at {
            return Err(ServiceError::validation(FieldError::expired_token()));
        }
        Ok(record)
    }

    /// Checks `username`/`password`, stamps `last_login` and, for
    /// `tokenAuth`, unarchives. Returns the user and whether it was unarchived.
    fn sign_in(
        &self,
        username: &str,
        password: &str,
        flow: SignIn,
    ) -> ServiceResult<(User, bool)> {
        let Some(mut user) = self.users.find_by_username(username)? else {
            info!("event=auth_sign_in module=service status=error error_code=invalid_credentials");
            return Err(ServiceError::InvalidCredentials);
        };
        let hash = self.users.password_hash(user.id)?.unwrap_or_default();
        if !self.passwords.verify(password, &hash) || !user.is_active {
            info!(
                "event=auth_sign_in module=service status=error error_code=invalid_credentials user_id={}",
                user.id
            );
            return Err(ServiceError::InvalidCredentials);
        }

        let mut unarchiving = false;
        if flow == SignIn::TokenAuth {
            if !user.verified && !self.config.allow_login_not_verified {
                return Err(ServiceError::validation(FieldError::not_verified()));
            }
            if user.archived {
                self.users.set_archived(user.id, false)?;
                user.archived = false;
                unarchiving = true;
            }
        }
        let now = now_epoch_ms();
        self.users.record_login(user.id, now)?;
        user.last_login = Some(now);

        Ok((user, unarchiving))
    }

    fn token_owner(&self, record: &AuthToken) -> ServiceResult<User> {
        self.users
            .get_user(record.user_id)?
            .filter(User::can_authenticate)
            .ok_or_else(|| ServiceError::validation(FieldError::invalid_token()))
    }
}

/// Issues and stores an access/refresh pair for `user_id`.
pub(crate) fn issue_token_pair<T: TokenRepository>(
    tokens: &T,
    user_id: UserId,
    now: i64,
    config: &AuthConfig,
) -> RepoResult<TokenPair> {
    let access = issue_token(tokens, user_id, AuthTokenKind::Access, now, config)?;
    let refresh = issue_token(tokens, user_id, AuthTokenKind::Refresh, now, config)?;
    Ok(TokenPair {
        token: access.token,
        refresh_token: refresh.token,
        expires_at: access.expires_at,
        refresh_expires_at: refresh.expires_at,
    })
}

fn issue_token<T: TokenRepository>(
    tokens: &T,
    user_id: UserId,
    kind: AuthTokenKind,
    now: i64,
    config: &AuthConfig,
) -> RepoResult<AuthToken> {
    let ttl = match kind {
        AuthTokenKind::Access => config.access_token_ttl,
        AuthTokenKind::Refresh => config.refresh_token_ttl,
    };
    let record = AuthToken {
        token: generate_token(),
        kind,
        user_id,
        created_at: now,
        expires_at: deadline_after(now, ttl),
        revoked_at: None,
    };
    tokens.insert_auth_token(&record)?;
    Ok(record)
}

fn payload_for(user: &User, record: &AuthToken) -> TokenPayload {
    TokenPayload {
        username: user.username.clone(),
        exp: record.expires_at / 1000,
        orig_iat: record.created_at / 1000,
    }
}
