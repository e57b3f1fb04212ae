use quill_core::auth::password::hash_password;
use quill_core::db::open_db_in_memory;
use quill_core::model::user::NewUser;
use quill_core::repo::token_repo::SqliteTokenRepository;
use quill_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use quill_core::service::auth_service::AuthService;
use quill_core::{AuthConfig, ServiceError, User};
use rusqlite::Connection;
use std::time::Duration;

const PASSWORD: &str = "correct-horse-battery";

fn config() -> AuthConfig {
    AuthConfig {
        password_hash_cost: 4,
        ..AuthConfig::default()
    }
}

fn add_user(conn: &Connection, username: &str) -> User {
    SqliteUserRepository::new(conn)
        .create_user(
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(PASSWORD, 4).unwrap(),
            },
            0,
        )
        .unwrap()
}

fn service(
    conn: &Connection,
    config: AuthConfig,
) -> AuthService<SqliteUserRepository<'_>, SqliteTokenRepository<'_>> {
    AuthService::new(
        SqliteUserRepository::new(conn),
        SqliteTokenRepository::new(conn),
        config,
    )
}

fn error_code(err: &ServiceError) -> &'static str {
    err.field_errors().expect("business error")[0].code
}

#[test]
fn login_issues_a_token_that_authenticates_the_user() {
    let conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let auth = service(&conn, config());

    let token = auth.login("ada", PASSWORD).unwrap();
    assert!(!token.is_empty());

    let caller = auth.authenticate(&token).unwrap().expect("live token");
    assert_eq!(caller.user_id, ada.id);
    assert_eq!(caller.username, "ada");

    let stored = SqliteUserRepository::new(&conn).get_user(ada.id).unwrap().unwrap();
    assert!(stored.last_login.is_some());
}

#[test]
fn bad_credentials_and_inactive_users_are_indistinguishable() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");
    let bob = add_user(&conn, "bob");
    SqliteUserRepository::new(&conn).set_active(bob.id, false).unwrap();
    let auth = service(&conn, config());

    for (username, password) in [("ghost", PASSWORD), ("ada", "wrong"), ("bob", PASSWORD)] {
        let err = auth.login(username, password).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials), "{username}");
    }
    let issued: i64 = conn
        .query_row("SELECT COUNT(*) FROM auth_tokens;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(issued, 0);
}

#[test]
fn unverified_login_respects_policy() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");
    let strict = service(
        &conn,
        AuthConfig {
            allow_login_not_verified: false,
            ..config()
        },
    );

    let err = strict.token_auth("ada", PASSWORD).unwrap_err();
    assert_eq!(error_code(&err), "not_verified");
}

#[test]
fn garbage_and_unknown_tokens_do_not_authenticate() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn, config());

    assert_eq!(auth.authenticate("").unwrap(), None);
    assert_eq!(auth.authenticate("JWT nonsense").unwrap(), None);
    assert_eq!(auth.authenticate(&"a".repeat(64)).unwrap(), None);
}

#[test]
fn refresh_token_rotates_and_is_single_use() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");
    let auth = service(&conn, config());

    let outcome = auth.token_auth("ada", PASSWORD).unwrap();
    let refreshed = auth.refresh_token(&outcome.tokens.refresh_token).unwrap();
    assert_eq!(refreshed.payload.username, "ada");
    assert_ne!(refreshed.tokens.refresh_token, outcome.tokens.refresh_token);
    assert!(auth.authenticate(&refreshed.tokens.token).unwrap().is_some());

    let err = auth.refresh_token(&outcome.tokens.refresh_token).unwrap_err();
    assert_eq!(error_code(&err), "invalid_token");

    // An access token is not a refresh token.
    let err = auth.refresh_token(&refreshed.tokens.token).unwrap_err();
    assert_eq!(error_code(&err), "invalid_token");
}

#[test]
fn revoked_refresh_token_cannot_refresh() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");
    let auth = service(&conn, config());

    let outcome = auth.token_auth("ada", PASSWORD).unwrap();
    let revoked_at = auth.revoke_token(&outcome.tokens.refresh_token).unwrap();
    assert!(revoked_at > 0);

    let err = auth.refresh_token(&outcome.tokens.refresh_token).unwrap_err();
    assert_eq!(error_code(&err), "invalid_token");
    let err = auth.revoke_token(&outcome.tokens.refresh_token).unwrap_err();
    assert_eq!(error_code(&err), "invalid_token");
}

#[test]
fn verify_token_reports_payload_and_expiry() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");

    let auth = service(&conn, config());
    let token = auth.login("ada", PASSWORD).unwrap();
    let payload = auth.verify_token(&token).unwrap();
    assert_eq!(payload.username, "ada");
    assert!(payload.exp >= payload.orig_iat);

    let instant = service(
        &conn,
        AuthConfig {
            access_token_ttl: Duration::ZERO,
            ..config()
        },
    );
    let expired = instant.login("ada", PASSWORD).unwrap();
    assert_eq!(instant.authenticate(&expired).unwrap(), None);
    let err = instant.verify_token(&expired).unwrap_err();
    assert_eq!(error_code(&err), "expired_token");
}

#[test]
fn archived_user_is_locked_out_until_token_auth_unarchives() {
    let conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    let auth = service(&conn, config());
    let token = auth.login("ada", PASSWORD).unwrap();

    SqliteUserRepository::new(&conn).set_archived(ada.id, true).unwrap();
    assert_eq!(auth.authenticate(&token).unwrap(), None);

    let outcome = auth.token_auth("ada", PASSWORD).unwrap();
    assert!(outcome.unarchiving);
    assert!(!outcome.user.archived);
    assert!(auth.authenticate(&outcome.tokens.token).unwrap().is_some());

    let again = auth.token_auth("ada", PASSWORD).unwrap();
    assert!(!again.unarchiving);
}

#[test]
fn plain_login_only_checks_credentials() {
    let conn = open_db_in_memory().unwrap();
    let ada = add_user(&conn, "ada");
    SqliteUserRepository::new(&conn).set_archived(ada.id, true).unwrap();
    let strict = service(
        &conn,
        AuthConfig {
            allow_login_not_verified: false,
            ..config()
        },
    );

    let token = strict.login("ada", PASSWORD).unwrap();
    let stored = SqliteUserRepository::new(&conn).get_user(ada.id).unwrap().unwrap();
    assert!(stored.archived);
    assert!(!stored.verified);
    assert!(stored.last_login.is_some());
    assert_eq!(strict.authenticate(&token).unwrap(), None);
}

#[test]
fn purge_drops_only_expired_tokens() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "ada");
    let expired = service(
        &conn,
        AuthConfig {
            access_token_ttl: Duration::ZERO,
            ..config()
        },
    );
    expired.login("ada", PASSWORD).unwrap();
    let live = service(&conn, config());
    let token = live.login("ada", PASSWORD).unwrap();

    assert_eq!(live.purge_expired().unwrap(), 1);
    assert!(live.authenticate(&token).unwrap().is_some());
}
