//! `quill` server entry point.
//!
//! # Responsibility
//! - Parse flags (each with an environment fallback) into core and API config.
//! - Initialize logging, open the database and serve until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use log::info;
use quill_api::{build_schema, router, serve, AppState, ServerConfig, SharedMailer};
use quill_core::config::{DEFAULT_ACCESS_TOKEN_TTL, DEFAULT_REFRESH_TOKEN_TTL};
use quill_core::service::mail::LogMailer;
use quill_core::{core_version, default_log_level, init_logging, AuthConfig, DbLocation};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Parser)]
#[clap(name = "quill", version, about = "Blog GraphQL API server")]
struct Args {
    /// The IP address to bind the HTTP server to.
    #[clap(long = "ip", default_value = "127.0.0.1", value_parser, env = "QUILL_IP")]
    ip: IpAddr,

    /// The port to bind the HTTP server to.
    #[clap(long = "port", default_value = "8000", env = "QUILL_PORT")]
    port: u16,

    /// SQLite database file. Created and migrated when missing.
    #[clap(
        long = "db-path",
        default_value = "quill.sqlite3",
        env = "QUILL_DB_PATH",
        conflicts_with = "in_memory"
    )]
    db_path: PathBuf,

    /// Keep all data in memory; it is lost on exit.
    #[clap(long = "in-memory", env = "QUILL_IN_MEMORY")]
    in_memory: bool,

    /// One of trace|debug|info|warn|error. Defaults by build mode.
    #[clap(long = "log-level", env = "QUILL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files. Logs go to stderr when unset.
    #[clap(long = "log-dir", env = "QUILL_LOG_DIR")]
    log_dir: Option<String>,

    /// Do not serve the GraphiQL console.
    #[clap(long = "no-graphiql", env = "QUILL_NO_GRAPHIQL")]
    no_graphiql: bool,

    /// Timeout before a request is dropped.
    #[clap(long = "request-timeout", default_value = "30s", env = "QUILL_REQUEST_TIMEOUT")]
    request_timeout: humantime::Duration,

    /// The max body size of a request, in bytes.
    #[clap(long = "body-limit", default_value = "1048576", env = "QUILL_BODY_LIMIT")]
    body_limit: usize,

    /// Lifetime of access tokens.
    #[clap(long = "access-token-ttl", env = "QUILL_ACCESS_TOKEN_TTL")]
    access_token_ttl: Option<humantime::Duration>,

    /// Lifetime of refresh tokens.
    #[clap(long = "refresh-token-ttl", env = "QUILL_REFRESH_TOKEN_TTL")]
    refresh_token_ttl: Option<humantime::Duration>,

    /// Let accounts sign in before verifying their email.
    #[clap(
        long = "allow-login-not-verified",
        default_value = "true",
        action = clap::ArgAction::Set,
        env = "QUILL_ALLOW_LOGIN_NOT_VERIFIED"
    )]
    allow_login_not_verified: bool,
}

impl Args {
    fn db_location(&self) -> DbLocation {
        if self.in_memory {
            DbLocation::Memory
        } else {
            DbLocation::File(self.db_path.clone())
        }
    }

    fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            access_token_ttl: self
                .access_token_ttl
                .map_or(DEFAULT_ACCESS_TOKEN_TTL, Into::into),
            refresh_token_ttl: self
                .refresh_token_ttl
                .map_or(DEFAULT_REFRESH_TOKEN_TTL, Into::into),
            allow_login_not_verified: self.allow_login_not_verified,
            ..AuthConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(self.ip, self.port),
            graphiql: !self.no_graphiql,
            request_timeout: self.request_timeout.into(),
            body_limit: self.body_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, args.log_dir.as_deref()).context("failed to initialize logging")?;
    info!("event=cli_start module=cli status=ok version={}", core_version());

    let conn = args
        .db_location()
        .open()
        .context("failed to open the database")?;
    let mailer: SharedMailer = Arc::new(LogMailer);
    let state = AppState::new(conn, args.auth_config(), mailer);
    let purged = state
        .purge_expired_tokens()
        .context("failed to purge expired tokens")?;
    info!("event=token_purge module=cli status=ok purged={purged}");

    let config = args.server_config();
    let schema = build_schema(state.clone());
    let app = router(schema, state, &config);

    serve(app, config.addr, shutdown_signal())
        .await
        .context("http server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("event=signal_wait module=cli status=error error={err}");
    }
    info!("event=cli_shutdown module=cli status=start");
}
