//! HTTP surface: axum router and server loop.
//!
//! # Responsibility
//! - Route GraphQL requests to the schema with a per-request [`RequestContext`].
//! - Serve GraphiQL and a health check.
//! - Bound request time and body size.

use crate::context::{bearer_token, RequestContext};
use crate::schema::QuillSchema;
use crate::state::AppState;
use async_graphql::http::GraphiQLSource;
use async_graphql::{Request, Response};
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde_json::json;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

pub const GRAPHQL_ENDPOINT: &str = "/graphql/";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Serve the GraphiQL console on `GET /graphql/`.
    pub graphiql: bool,
    pub request_timeout: Duration,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            graphiql: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

pub fn router(schema: QuillSchema, state: AppState, config: &ServerConfig) -> Router {
    let mut graphql = post(graphql_handler).options(ok);
    if config.graphiql {
        graphql = graphql.get(graphiql);
    }

    Router::new()
        .route(GRAPHQL_ENDPOINT, graphql)
        .route("/graphql", post(graphql_handler).options(ok))
        .route("/health", get(health))
        .layer(Extension(schema))
        .layer(Extension(state))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("authorization, content-type"),
        ))
        .layer(DefaultBodyLimit::max(config.body_limit))
}

/// Binds `addr` and serves `router` until `shutdown` resolves.
pub async fn serve(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "event=http_listen module=api status=ok addr={}",
        listener.local_addr()?
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("event=http_shutdown module=api status=ok");
    Ok(())
}

async fn graphql_handler(
    schema: Extension<QuillSchema>,
    state: Extension<AppState>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response> {
    let context = RequestContext::from_token(&state, bearer_token(&headers));
    schema.execute(req.0.data(context)).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint(GRAPHQL_ENDPOINT)
            .title("Quill GraphiQL")
            .finish(),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "up": true }))
}

async fn ok() {}
