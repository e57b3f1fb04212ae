mod common;

use common::{Harness, PASSWORD};
use quill_core::service::mail::MailKind;
use serde_json::{json, Value};

fn payload<'a>(response: &'a Value, field: &str) -> &'a Value {
    &response["data"][field]
}

fn first_code(payload: &Value) -> &str {
    payload["errors"][0]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn register_and_verify_with_mailed_token() {
    let harness = Harness::new();
    let token = harness.sign_up("ada").await;
    let activation = harness
        .mailer
        .last_token("ada@example.com", MailKind::Activation)
        .expect("activation mail");

    let query = format!(r#"mutation {{ verifyAccount(token: "{activation}") {{ success errors {{ field code }} }} }}"#);
    let response = harness.execute(None, &query).await;
    assert_eq!(
        payload(&response, "verifyAccount"),
        &json!({ "success": true, "errors": null })
    );

    let response = harness.execute(Some(&token), "{ me { verified } }").await;
    assert_eq!(response["data"]["me"]["verified"], true);

    let response = harness.execute(None, &query).await;
    let result = payload(&response, "verifyAccount");
    assert_eq!(result["success"], false);
    assert_eq!(first_code(result), "already_verified");
    assert_eq!(result["errors"][0]["field"], "nonFieldErrors");
}

#[tokio::test]
async fn register_reports_field_errors_in_payload() {
    let harness = Harness::new();
    harness.sign_up("ada").await;

    let response = harness
        .execute(
            None,
            r#"mutation {
                register(email: "ada@example.com", username: "ada2",
                         password1: "short", password2: "short") {
                    success token errors { field code }
                }
            }"#,
        )
        .await;
    let result = payload(&response, "register");
    assert_eq!(result["success"], false);
    assert_eq!(result["token"], Value::Null);
    assert_eq!(
        result["errors"],
        json!([
            { "field": "email", "code": "unique" },
            { "field": "password2", "code": "password_too_short" }
        ])
    );
}

#[tokio::test]
async fn register_rejects_passwords_bcrypt_would_truncate() {
    let harness = Harness::new();
    let long = format!("{}tail", "p".repeat(72));

    let response = harness
        .execute(
            None,
            &format!(
                r#"mutation {{
                    register(email: "ada@example.com", username: "ada",
                             password1: "{long}", password2: "{long}") {{
                        success errors {{ field code }}
                    }}
                }}"#
            ),
        )
        .await;
    let result = payload(&response, "register");
    assert_eq!(result["success"], false);
    assert_eq!(
        result["errors"],
        json!([{ "field": "password2", "code": "password_too_long" }])
    );

    let response = harness
        .execute(
            None,
            &format!(r#"mutation {{ login(username: "ada", password: "{long}") {{ token }} }}"#),
        )
        .await;
    assert_eq!(response["errors"][0]["extensions"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn token_auth_refresh_and_revoke() {
    let harness = Harness::new();
    harness.sign_up("ada").await;

    let response = harness
        .execute(
            None,
            &format!(
                r#"mutation {{
                    tokenAuth(username: "ada", password: "{PASSWORD}") {{
                        success token refreshToken unarchiving user {{ username }}
                    }}
                }}"#
            ),
        )
        .await;
    let result = payload(&response, "tokenAuth");
    assert_eq!(result["success"], true);
    assert_eq!(result["user"]["username"], "ada");
    let access = result["token"].as_str().unwrap().to_string();
    let refresh = result["refreshToken"].as_str().unwrap().to_string();

    let response = harness
        .execute(
            None,
            &format!(r#"mutation {{ verifyToken(token: "{access}") {{ success payload {{ username }} }} }}"#),
        )
        .await;
    assert_eq!(
        payload(&response, "verifyToken")["payload"]["username"],
        "ada"
    );

    let refresh_query = format!(
        r#"mutation {{ refreshToken(refreshToken: "{refresh}") {{ success refreshToken errors {{ code }} }} }}"#
    );
    let response = harness.execute(None, &refresh_query).await;
    let rotated = payload(&response, "refreshToken");
    assert_eq!(rotated["success"], true);
    let new_refresh = rotated["refreshToken"].as_str().unwrap().to_string();

    let response = harness.execute(None, &refresh_query).await;
    assert_eq!(first_code(payload(&response, "refreshToken")), "invalid_token");

    let response = harness
        .execute(
            None,
            &format!(r#"mutation {{ revokeToken(refreshToken: "{new_refresh}") {{ success revoked }} }}"#),
        )
        .await;
    let revoked = payload(&response, "revokeToken");
    assert_eq!(revoked["success"], true);
    assert!(revoked["revoked"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn caller_mutations_report_unauthenticated_in_payload() {
    let harness = Harness::new();

    let response = harness
        .execute(
            None,
            r#"mutation { swapEmails(password: "x") { success errors { code } } }"#,
        )
        .await;
    let result = payload(&response, "swapEmails");
    assert_eq!(result["success"], false);
    assert_eq!(first_code(result), "unauthenticated");
    assert!(response.get("errors").is_none());
}

#[tokio::test]
async fn unverified_caller_cannot_change_password() {
    let harness = Harness::new();
    let token = harness.sign_up("ada").await;

    let response = harness
        .execute(
            Some(&token),
            &format!(
                r#"mutation {{
                    passwordChange(oldPassword: "{PASSWORD}", newPassword1: "a-new-secret",
                                   newPassword2: "a-new-secret") {{
                        success errors {{ code }}
                    }}
                }}"#
            ),
        )
        .await;
    assert_eq!(first_code(payload(&response, "passwordChange")), "not_verified");
}

#[tokio::test]
async fn password_reset_token_works_once() {
    let harness = Harness::new();
    harness.sign_up("ada").await;

    harness
        .execute(
            None,
            r#"mutation { sendPasswordResetEmail(email: "ada@example.com") { success } }"#,
        )
        .await;
    let reset = harness
        .mailer
        .last_token("ada@example.com", MailKind::PasswordReset)
        .expect("reset mail");

    let query = format!(
        r#"mutation {{
            passwordReset(token: "{reset}", newPassword1: "a-new-secret", newPassword2: "a-new-secret") {{
                success errors {{ code }}
            }}
        }}"#
    );
    let response = harness.execute(None, &query).await;
    assert_eq!(payload(&response, "passwordReset")["success"], true);

    let response = harness.execute(None, &query).await;
    assert_eq!(first_code(payload(&response, "passwordReset")), "invalid_token");

    let response = harness
        .execute(
            None,
            r#"mutation { login(username: "ada", password: "a-new-secret") { token } }"#,
        )
        .await;
    assert!(response["data"]["login"]["token"].is_string());
}
