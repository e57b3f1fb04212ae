//! Account lifecycle and token mutations.
//!
//! Business failures (bad input, wrong password, bad token) are returned in
//! the payload as `success: false` plus `errors`; only internal failures
//! become GraphQL errors.

use crate::context::{app_state, current_caller};
use crate::error::IntoGraphqlError;
use crate::schema::user::UserType;
use crate::state::{Accounts, HashOwner, PasswordWork};
use async_graphql::{Context, Object, SimpleObject};
use quill_core::model::user::ProfileUpdate;
use quill_core::service::account_service::RegisterRequest;
use quill_core::service::auth_service::{TokenPair, TokenPayload};
use quill_core::{Caller, FieldError, ServiceError, ServiceResult};

type Outcome<T> = Result<T, Vec<FieldErrorType>>;

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "FieldError")]
pub struct FieldErrorType {
    field: String,
    message: String,
    code: String,
}

impl From<FieldError> for FieldErrorType {
    fn from(error: FieldError) -> Self {
        Self {
            field: error.field,
            message: error.message,
            code: error.code.to_string(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "TokenPayload")]
pub struct TokenPayloadType {
    username: String,
    /// Expiry, epoch seconds.
    exp: i64,
    /// Issue time, epoch seconds.
    orig_iat: i64,
}

impl From<TokenPayload> for TokenPayloadType {
    fn from(payload: TokenPayload) -> Self {
        Self {
            username: payload.username,
            exp: payload.exp,
            orig_iat: payload.orig_iat,
        }
    }
}

macro_rules! status_payload {
    ($($name:ident),* $(,)?) => {$(
        #[derive(SimpleObject)]
        pub struct $name {
            success: bool,
            errors: Option<Vec<FieldErrorType>>,
        }

        impl From<Outcome<()>> for $name {
            fn from(outcome: Outcome<()>) -> Self {
                match outcome {
                    Ok(()) => Self {
                        success: true,
                        errors: None,
                    },
                    Err(errors) => Self {
                        success: false,
                        errors: Some(errors),
                    },
                }
            }
        }
    )*};
}

status_payload!(
    VerifyAccount,
    ResendActivationEmail,
    SendPasswordResetEmail,
    PasswordReset,
    ArchiveAccount,
    DeleteAccount,
    UpdateAccount,
    SendSecondaryEmailActivation,
    VerifySecondaryEmail,
    SwapEmails,
);

#[derive(SimpleObject, Default)]
pub struct Register {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(SimpleObject, Default)]
pub struct PasswordChange {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(SimpleObject, Default)]
#[graphql(name = "ObtainJSONWebToken")]
pub struct ObtainJsonWebToken {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserType>,
    unarchiving: bool,
}

#[derive(SimpleObject, Default)]
pub struct VerifyToken {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    payload: Option<TokenPayloadType>,
}

#[derive(SimpleObject, Default)]
pub struct RefreshToken {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    token: Option<String>,
    refresh_token: Option<String>,
    payload: Option<TokenPayloadType>,
}

#[derive(SimpleObject, Default)]
pub struct RevokeToken {
    success: bool,
    errors: Option<Vec<FieldErrorType>>,
    /// Revocation time, epoch seconds.
    revoked: Option<i64>,
}

#[derive(Default)]
pub struct AccountMutation;

#[Object]
impl AccountMutation {
    async fn register(
        &self,
        ctx: &Context<'_>,
        email: String,
        username: String,
        password1: String,
        password2: String,
    ) -> async_graphql::Result<Register> {
        let request = RegisterRequest {
            email,
            username,
            password1,
            password2,
        };
        let state = app_state(ctx)?;
        let work = PasswordWork::hash(&request.password1, &request.password2);
        let prepared = state.prepare_passwords(work).await;
        let result = prepared.and_then(|passwords| {
            state.with_accounts_using(passwords, |accounts| accounts.register(request))
        });
        Ok(match settle(result)? {
            Ok(outcome) => {
                let (token, refresh_token) = split_pair(outcome.tokens);
                Register {
                    success: true,
                    errors: None,
                    token,
                    refresh_token,
                }
            }
            Err(errors) => Register {
                errors: Some(errors),
                ..Register::default()
            },
        })
    }

    async fn verify_account(
        &self,
        ctx: &Context<'_>,
        token: String,
    ) -> async_graphql::Result<VerifyAccount> {
        let result = app_state(ctx)?.with_accounts(|accounts| accounts.verify_account(&token));
        Ok(settle(result)?.into())
    }

    async fn resend_activation_email(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> async_graphql::Result<ResendActivationEmail> {
        let result =
            app_state(ctx)?.with_accounts(|accounts| accounts.resend_activation_email(&email));
        Ok(settle(result)?.into())
    }

    async fn send_password_reset_email(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> async_graphql::Result<SendPasswordResetEmail> {
        let result =
            app_state(ctx)?.with_accounts(|accounts| accounts.send_password_reset_email(&email));
        Ok(settle(result)?.into())
    }

    async fn password_reset(
        &self,
        ctx: &Context<'_>,
        token: String,
        new_password1: String,
        new_password2: String,
    ) -> async_graphql::Result<PasswordReset> {
        let state = app_state(ctx)?;
        let result = state
            .prepare_passwords(PasswordWork::hash(&new_password1, &new_password2))
            .await
            .and_then(|passwords| {
                state.with_accounts_using(passwords, |accounts| {
                    accounts.password_reset(&token, &new_password1, &new_password2)
                })
            });
        Ok(settle(result)?.into())
    }

    async fn password_change(
        &self,
        ctx: &Context<'_>,
        old_password: String,
        new_password1: String,
        new_password2: String,
    ) -> async_graphql::Result<PasswordChange> {
        let new_password = Some((new_password1.as_str(), new_password2.as_str()));
        let outcome = with_checked_caller(ctx, &old_password, new_password, |accounts, caller| {
            accounts.password_change(caller, &old_password, &new_password1, &new_password2)
        })
        .await?;
        Ok(match outcome {
            Ok(pair) => {
                let (token, refresh_token) = split_pair(Some(pair));
                PasswordChange {
                    success: true,
                    errors: None,
                    token,
                    refresh_token,
                }
            }
            Err(errors) => PasswordChange {
                errors: Some(errors),
                ..PasswordChange::default()
            },
        })
    }

    async fn archive_account(
        &self,
        ctx: &Context<'_>,
        password: String,
    ) -> async_graphql::Result<ArchiveAccount> {
        let outcome = with_checked_caller(ctx, &password, None, |accounts, caller| {
            accounts.archive_account(caller, &password)
        })
        .await?;
        Ok(outcome.into())
    }

    async fn delete_account(
        &self,
        ctx: &Context<'_>,
        password: String,
    ) -> async_graphql::Result<DeleteAccount> {
        let outcome = with_checked_caller(ctx, &password, None, |accounts, caller| {
            accounts.delete_account(caller, &password)
        })
        .await?;
        Ok(outcome.into())
    }

    async fn update_account(
        &self,
        ctx: &Context<'_>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> async_graphql::Result<UpdateAccount> {
        let update = ProfileUpdate {
            first_name,
            last_name,
        };
        let state = app_state(ctx)?;
        let result = with_caller(ctx, |caller| {
            state.with_accounts(|accounts| accounts.update_account(caller, update).map(|_| ()))
        });
        Ok(settle(result)?.into())
    }

    async fn send_secondary_email_activation(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<SendSecondaryEmailActivation> {
        let outcome = with_checked_caller(ctx, &password, None, |accounts, caller| {
            accounts.send_secondary_email_activation(caller, &email, &password)
        })
        .await?;
        Ok(outcome.into())
    }

    async fn verify_secondary_email(
        &self,
        ctx: &Context<'_>,
        token: String,
    ) -> async_graphql::Result<VerifySecondaryEmail> {
        let result =
            app_state(ctx)?.with_accounts(|accounts| accounts.verify_secondary_email(&token));
        Ok(settle(result)?.into())
    }

    async fn swap_emails(
        &self,
        ctx: &Context<'_>,
        password: String,
    ) -> async_graphql::Result<SwapEmails> {
        let outcome = with_checked_caller(ctx, &password, None, |accounts, caller| {
            accounts.swap_emails(caller, &password)
        })
        .await?;
        Ok(outcome.into())
    }

    async fn token_auth(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> async_graphql::Result<ObtainJsonWebToken> {
        let state = app_state(ctx)?;
        let result = state
            .prepare_passwords(PasswordWork::check(HashOwner::Username(&username), &password))
            .await
            .and_then(|passwords| {
                state.with_auth_using(passwords, |auth| auth.token_auth(&username, &password))
            });
        Ok(match settle(result)? {
            Ok(outcome) => ObtainJsonWebToken {
                success: true,
                errors: None,
                token: Some(outcome.tokens.token),
                refresh_token: Some(outcome.tokens.refresh_token),
                user: Some(UserType(outcome.user)),
                unarchiving: outcome.unarchiving,
            },
            Err(errors) => ObtainJsonWebToken {
                errors: Some(errors),
                ..ObtainJsonWebToken::default()
            },
        })
    }

    async fn verify_token(
        &self,
        ctx: &Context<'_>,
        token: String,
    ) -> async_graphql::Result<VerifyToken> {
        let result = app_state(ctx)?.with_auth(|auth| auth.verify_token(&token));
        Ok(match settle(result)? {
            Ok(payload) => VerifyToken {
                success: true,
                errors: None,
                payload: Some(payload.into()),
            },
            Err(errors) => VerifyToken {
                errors: Some(errors),
                ..VerifyToken::default()
            },
        })
    }

    async fn refresh_token(
        &self,
        ctx: &Context<'_>,
        refresh_token: String,
    ) -> async_graphql::Result<RefreshToken> {
        let result = app_state(ctx)?.with_auth(|auth| auth.refresh_token(&refresh_token));
        Ok(match settle(result)? {
            Ok(outcome) => RefreshToken {
                success: true,
                errors: None,
                token: Some(outcome.tokens.token),
                refresh_token: Some(outcome.tokens.refresh_token),
                payload: Some(outcome.payload.into()),
            },
            Err(errors) => RefreshToken {
                errors: Some(errors),
                ..RefreshToken::default()
            },
        })
    }

    async fn revoke_token(
        &self,
        ctx: &Context<'_>,
        refresh_token: String,
    ) -> async_graphql::Result<RevokeToken> {
        let result = app_state(ctx)?.with_auth(|auth| auth.revoke_token(&refresh_token));
        Ok(match settle(result)? {
            Ok(revoked) => RevokeToken {
                success: true,
                errors: None,
                revoked: Some(revoked),
            },
            Err(errors) => RevokeToken {
                errors: Some(errors),
                ..RevokeToken::default()
            },
        })
    }
}

/// Splits a service result into payload errors and GraphQL errors.
fn settle<T>(result: ServiceResult<T>) -> async_graphql::Result<Outcome<T>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) => match err.field_errors() {
            Some(errors) => Ok(Err(errors.into_iter().map(FieldErrorType::from).collect())),
            None => Err(err.into_graphql()),
        },
    }
}

/// Runs `f` with the request's caller; anonymous requests get an
/// `unauthenticated` payload error.
fn with_caller<T>(
    ctx: &Context<'_>,
    f: impl FnOnce(&Caller) -> ServiceResult<T>,
) -> ServiceResult<T> {
    current_caller(ctx).map_or(Err(ServiceError::Unauthenticated), f)
}

/// Like [`with_caller`] for mutations that confirm the caller's `password`,
/// optionally setting a new one. Hashing happens before storage is locked.
async fn with_checked_caller<T>(
    ctx: &Context<'_>,
    password: &str,
    new_password: Option<(&str, &str)>,
    f: impl FnOnce(&Accounts<'_>, &Caller) -> ServiceResult<T>,
) -> async_graphql::Result<Outcome<T>> {
    let state = app_state(ctx)?;
    let Some(caller) = current_caller(ctx) else {
        return settle(Err(ServiceError::Unauthenticated));
    };
    let mut work = PasswordWork::check(HashOwner::User(caller.user_id), password);
    if let Some((password1, password2)) = new_password {
        work = work.and_hash(password1, password2);
    }
    let result = state
        .prepare_passwords(work)
        .await
        .and_then(|passwords| {
            state.with_accounts_using(passwords, |accounts| f(accounts, caller))
        });
    settle(result)
}

fn split_pair(pair: Option<TokenPair>) -> (Option<String>, Option<String>) {
    match pair {
        Some(pair) => (Some(pair.token), Some(pair.refresh_token)),
        None => (None, None),
    }
}
