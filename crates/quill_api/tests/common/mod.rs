#![allow(dead_code)]

use async_graphql::Request;
use quill_api::{build_schema, AppState, QuillSchema, RequestContext, SharedHasher, SharedMailer};
use quill_core::db::open_db_in_memory;
use quill_core::service::mail::MemoryMailer;
use quill_core::AuthConfig;
use serde_json::Value;
use std::sync::Arc;

pub const PASSWORD: &str = "correct-horse-battery";

#[derive(Clone)]
pub struct Harness {
    pub state: AppState,
    pub schema: QuillSchema,
    pub mailer: Arc<MemoryMailer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig {
            password_hash_cost: 4,
            ..AuthConfig::default()
        })
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let mailer = Arc::new(MemoryMailer::new());
        let shared: SharedMailer = mailer.clone();
        let state = AppState::new(open_db_in_memory().unwrap(), config, shared);
        Self::from_state(state, mailer)
    }

    /// Harness whose password work goes through `hasher`.
    pub fn with_hasher(hasher: SharedHasher) -> Self {
        let harness = Self::new();
        Self::from_state(harness.state.with_password_hasher(hasher), harness.mailer)
    }

    fn from_state(state: AppState, mailer: Arc<MemoryMailer>) -> Self {
        let schema = build_schema(state.clone());
        Self {
            state,
            schema,
            mailer,
        }
    }

    /// Executes `query` as the holder of `token`, returning the JSON response.
    pub async fn execute(&self, token: Option<&str>, query: &str) -> Value {
        let context = RequestContext::from_token(&self.state, token);
        let response = self.schema.execute(Request::new(query).data(context)).await;
        serde_json::to_value(&response).unwrap()
    }

    /// Registers `username` and returns its access token.
    pub async fn sign_up(&self, username: &str) -> String {
        let response = self
            .execute(
                None,
                &format!(
                    r#"mutation {{
                        register(email: "{username}@example.com", username: "{username}",
                                 password1: "{PASSWORD}", password2: "{PASSWORD}") {{
                            success errors {{ code }} token
                        }}
                    }}"#
                ),
            )
            .await;
        assert_eq!(response["data"]["register"]["success"], true, "{response}");
        response["data"]["register"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

pub fn error_code(response: &Value) -> &str {
    response["errors"][0]["extensions"]["code"]
        .as_str()
        .unwrap_or_else(|| panic!("no error code in {response}"))
}
