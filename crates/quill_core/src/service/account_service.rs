//! Account lifecycle use-cases.
//!
//! # Responsibility
//! - Registration, verification, password reset/change, archive/delete,
//!   profile edits and secondary-email management.
//! - Mint single-use action tokens and hand them to the [`Mailer`].
//!
//! # Invariants
//! - Action tokens are consumed by a conditional update, so each one works
//!   at most once.
//! - Input is validated before a token is consumed; a rejected attempt
//!   leaves the token usable.
//! - Changing or resetting a password revokes every session token of the user.

use crate::auth::password::{
    is_valid_email, is_valid_username, validate_new_password, Bcrypt, PasswordHasher,
};
use crate::auth::token::{generate_token, looks_like_token};
use crate::auth::Caller;
use crate::clock::{deadline_after, now_epoch_ms};
use crate::config::AuthConfig;
use crate::model::token::{AccountAction, ActionToken};
use crate::model::user::{NewUser, ProfileUpdate, User};
use crate::repo::token_repo::TokenRepository;
use crate::repo::user_repo::UserRepository;
use crate::service::auth_service::{issue_token_pair, TokenPair};
use crate::service::error::{FieldError, ServiceError, ServiceResult};
use crate::service::mail::{MailKind, Mailer, OutgoingMail};
use log::info;

/// `register` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub user: User,
    /// Issued only when unverified accounts may sign in.
    pub tokens: Option<TokenPair>,
}

pub struct AccountService<U, T, M, P = Bcrypt>
where
    U: UserRepository,
    T: TokenRepository,
    M: Mailer,
    P: PasswordHasher,
{
    users: U,
    tokens: T,
    mailer: M,
    passwords: P,
    config: AuthConfig,
}

impl<U: UserRepository, T: TokenRepository, M: Mailer> AccountService<U, T, M> {
    /// Service hashing with bcrypt at `config.password_hash_cost`.
    pub fn new(users: U, tokens: T, mailer: M, config: AuthConfig) -> Self {
        let passwords = Bcrypt {
            cost: config.password_hash_cost,
        };
        Self::with_hasher(users, tokens, mailer, passwords, config)
    }
}

impl<U, T, M, P> AccountService<U, T, M, P>
where
    U: UserRepository,
    T: TokenRepository,
    M: Mailer,
    P: PasswordHasher,
{
    pub fn with_hasher(users: U, tokens: T, mailer: M, passwords: P, config: AuthConfig) -> Self {
        Self {
            users,
            tokens,
            mailer,
            passwords,
            config,
        }
    }

    /// Creates an unverified account and mails its activation token.
    pub fn register(&self, request: RegisterRequest) -> ServiceResult<RegisterOutcome> {
        let mut errors = Vec::new();
        if !is_valid_email(&request.email) {
            errors.push(FieldError::new(
                "email",
                "invalid_email",
                "Enter a valid email address.",
            ));
        } else if self.users.find_by_email(&request.email)?.is_some() {
            errors.push(unique_error("email"));
        }
        if !is_valid_username(&request.username) {
            errors.push(FieldError::new(
                "username",
                "invalid_username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            ));
        } else if self.users.find_by_username(&request.username)?.is_some() {
            errors.push(unique_error("username"));
        }
        errors.extend(validate_new_password(
            &request.password1,
            &request.password2,
            "password2",
            &request.username,
            &request.email,
            self.config.min_password_length,
        ));
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let now = now_epoch_ms();
        let password_hash = self.passwords.hash(&request.password1)?;
        let user = self.users.create_user(
            &NewUser {
                username: request.username,
                email: request.email,
                password_hash,
            },
            now,
        )?;
        self.send_action_mail(&user, &user.email, AccountAction::Activation, None, now)?;

        let tokens = if self.config.allow_login_not_verified {
            Some(issue_token_pair(&self.tokens, user.id, now, &self.config)?)
        } else {
            None
        };
        info!(
            "event=account_register module=service status=ok user_id={}",
            user.id
        );
        Ok(RegisterOutcome { user, tokens })
    }

    /// Consumes an activation token and marks its user verified.
    pub fn verify_account(&self, token: &str) -> ServiceResult<()> {
        let now = now_epoch_ms();
        let record = self.action_token(token, AccountAction::Activation, now)?;
        let user = self.token_user(&record)?;
        if user.verified {
            return Err(already_verified());
        }
        if record.consumed_at.is_some() {
            return Err(ServiceError::validation(FieldError::invalid_token()));
        }
        self.consume(&record, now)?;
        self.users.set_verified(user.id, true)?;
        info!(
            "event=account_verify module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    /// Mails a fresh activation token. Unknown emails succeed silently.
    pub fn resend_activation_email(&self, email: &str) -> ServiceResult<()> {
        let Some(user) = self.users.find_by_email(email)? else {
            return Ok(());
        };
        if user.verified {
            return Err(already_verified());
        }
        self.send_action_mail(&user, email, AccountAction::Activation, None, now_epoch_ms())
    }

    /// Mails a password reset token. Unknown emails succeed silently.
    pub fn send_password_reset_email(&self, email: &str) -> ServiceResult<()> {
        let Some(user) = self.users.find_by_email(email)? else {
            return Ok(());
        };
        self.send_action_mail(
            &user,
            email,
            AccountAction::PasswordReset,
            None,
            now_epoch_ms(),
        )
    }

    /// Sets a new password from a reset token.
    ///
    /// Also verifies the account, since the user proved control of the mailbox.
    pub fn password_reset(
        &self,
        token: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<()> {
        let now = now_epoch_ms();
        let record = self.live_action_token(token, AccountAction::PasswordReset, now)?;
        let user = self.token_user(&record)?;
        self.check_new_password(&user, new_password1, new_password2)?;

        self.consume(&record, now)?;
        self.set_password(&user, new_password1)?;
        if !user.verified {
            self.users.set_verified(user.id, true)?;
        }
        let revoked = self.tokens.revoke_user_tokens(user.id, now)?;
        info!(
            "event=account_password_reset module=service status=ok user_id={} revoked={revoked}",
            user.id
        );
        Ok(())
    }

    /// Changes the caller's password and returns a fresh token pair.
    pub fn password_change(
        &self,
        caller: &Caller,
        old_password: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ServiceResult<TokenPair> {
        let user = self.verified_user(caller)?;
        self.check_password(&user, old_password, "oldPassword")?;
        self.check_new_password(&user, new_password1, new_password2)?;

        let now = now_epoch_ms();
        self.set_password(&user, new_password1)?;
        self.tokens.revoke_user_tokens(user.id, now)?;
        let tokens = issue_token_pair(&self.tokens, user.id, now, &self.config)?;
        info!(
            "event=account_password_change module=service status=ok user_id={}",
            user.id
        );
        Ok(tokens)
    }

    /// Archives the caller's account. The next `tokenAuth` unarchives it.
    pub fn archive_account(&self, caller: &Caller, password: &str) -> ServiceResult<()> {
        let user = self.verified_user(caller)?;
        self.check_password(&user, password, "password")?;
        self.users.set_archived(user.id, true)?;
        self.tokens.revoke_user_tokens(user.id, now_epoch_ms())?;
        info!(
            "event=account_archive module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    /// Deactivates the caller's account. Rows and posts are kept.
    pub fn delete_account(&self, caller: &Caller, password: &str) -> ServiceResult<()> {
        let user = self.verified_user(caller)?;
        self.check_password(&user, password, "password")?;
        self.users.set_active(user.id, false)?;
        self.tokens.revoke_user_tokens(user.id, now_epoch_ms())?;
        info!(
            "event=account_delete module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    pub fn update_account(&self, caller: &Caller, update: ProfileUpdate) -> ServiceResult<User> {
        let user = self.verified_user(caller)?;
        Ok(self.users.update_profile(user.id, &update)?)
    }

    /// Mails a token that, once verified, attaches `email` as secondary address.
    pub fn send_secondary_email_activation(
        &self,
        caller: &Caller,
        email: &str,
        password: &str,
    ) -> ServiceResult<()> {
        let user = self.verified_user(caller)?;
        self.check_password(&user, password, "password")?;
        if !is_valid_email(email) {
            return Err(ServiceError::validation(FieldError::new(
                "email",
                "invalid_email",
                "Enter a valid email address.",
            )));
        }
        if self.users.find_by_email(email)?.is_some() {
            return Err(ServiceError::validation(unique_error("email")));
        }
        self.send_action_mail(
            &user,
            email,
            AccountAction::SecondaryEmail,
            Some(email),
            now_epoch_ms(),
        )
    }

    pub fn verify_secondary_email(&self, token: &str) -> ServiceResult<()> {
        let now = now_epoch_ms();
        let record = self.live_action_token(token, AccountAction::SecondaryEmail, now)?;
        let user = self.token_user(&record)?;
        let email = record
            .payload
            .as_deref()
            .ok_or_else(|| ServiceError::validation(FieldError::invalid_token()))?;

        self.consume(&record, now)?;
        self.users.set_secondary_email(user.id, Some(email))?;
        info!(
            "event=account_secondary_email module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    /// Exchanges the caller's primary and secondary email.
    pub fn swap_emails(&self, caller: &Caller, password: &str) -> ServiceResult<()> {
        let user = self.verified_user(caller)?;
        self.check_password(&user, password, "password")?;
        if !self.users.swap_emails(user.id)? {
            return Err(ServiceError::validation(FieldError::non_field(
                "no_secondary_email",
                "You don't have a secondary email.",
            )));
        }
        info!(
            "event=account_swap_emails module=service status=ok user_id={}",
            user.id
        );
        Ok(())
    }

    fn verified_user(&self, caller: &Caller) -> ServiceResult<User> {
        let user = self
            .users
            .get_user(caller.user_id)?
            .filter(User::can_authenticate)
            .ok_or(ServiceError::Unauthenticated)?;
        if !user.verified {
            return Err(ServiceError::validation(FieldError::not_verified()));
        }
        Ok(user)
    }

    fn check_password(&self, user: &User, password: &str, field: &str) -> ServiceResult<()> {
        let hash = self.users.password_hash(user.id)?.unwrap_or_default();
        if self.passwords.verify(password, &hash) {
            return Ok(());
        }
        Err(ServiceError::validation(FieldError::new(
            field,
            "invalid_password",
            "Invalid password.",
        )))
    }

    fn check_new_password(
        &self,
        user: &User,
        password1: &str,
        password2: &str,
    ) -> ServiceResult<()> {
        let errors = validate_new_password(
            password1,
            password2,
            "newPassword2",
            &user.username,
            &user.email,
            self.config.min_password_length,
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(errors))
        }
    }

    fn set_password(&self, user: &User, raw: &str) -> ServiceResult<()> {
        let hash = self.passwords.hash(raw)?;
        self.users.set_password_hash(user.id, &hash)?;
        Ok(())
    }

    fn send_action_mail(
        &self,
        user: &User,
        to: &str,
        action: AccountAction,
        payload: Option<&str>,
        now: i64,
    ) -> ServiceResult<()> {
        let (ttl, kind) = match action {
            AccountAction::Activation => (self.config.activation_token_ttl, MailKind::Activation),
            AccountAction::PasswordReset => {
                (self.config.password_reset_token_ttl, MailKind::PasswordReset)
            }
            AccountAction::SecondaryEmail => (
                self.config.secondary_email_token_ttl,
                MailKind::SecondaryEmailActivation,
            ),
        };
        let record = ActionToken {
            token: generate_token(),
            action,
            user_id: user.id,
            payload: payload.map(str::to_owned),
            created_at: now,
            expires_at: deadline_after(now, ttl),
            consumed_at: None,
        };
        self.tokens.insert_action_token(&record)?;

        self.mailer.send(&OutgoingMail {
            to: to.to_owned(),
            username: user.username.clone(),
            kind,
            token: record.token,
        })?;
        Ok(())
    }

    /// An unexpired token for `action`, consumed or not.
    fn action_token(
        &self,
        token: &str,
        action: AccountAction,
        now: i64,
    ) -> ServiceResult<ActionToken> {
        let invalid = || ServiceError::validation(FieldError::invalid_token());
        if !looks_like_token(token) {
            return Err(invalid());
        }
        let record = self.tokens.get_action_token(token)?.ok_or_else(invalid)?;
        if record.action != action {
            return Err(invalid());
        }
        if now >= record.expires_at {
            return Err(ServiceError::validation(FieldError::expired_token()));
        }
        Ok(record)
    }

    fn live_action_token(
        &self,
        token: &str,
        action: AccountAction,
        now: i64,
    ) -> ServiceResult<ActionToken> {
        let record = self.action_token(token, action, now)?;
        if record.consumed_at.is_some() {
            return Err(ServiceError::validation(FieldError::invalid_token()));
        }
        Ok(record)
    }

    fn token_user(&self, record: &ActionToken) -> ServiceResult<User> {
        self.users
            .get_user(record.user_id)?
            .filter(|user| user.is_active)
            .ok_or_else(|| ServiceError::validation(FieldError::invalid_token()))
    }

    fn consume(&self, record: &ActionToken, now: i64) -> ServiceResult<()> {
        if self.tokens.consume_action_token(&record.token, now)? {
            Ok(())
        } else {
            Err(ServiceError::validation(FieldError::invalid_token()))
        }
    }
}

fn unique_error(field: &str) -> FieldError {
    FieldError::new(
        field,
        "unique",
        format!("A user with that {field} already exists."),
    )
}

fn already_verified() -> ServiceError {
    ServiceError::validation(FieldError::non_field(
        "already_verified",
        "Account already verified.",
    ))
}
