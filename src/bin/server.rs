//! docchat Server Binary
//!
//! Starts the docchat REST API.
//!
//! ## Usage
//!
//! ```bash
//! # Start server with settings from config.toml / environment
//! cargo run --bin docchat-server
//!
//! # Override the bind address
//! cargo run --bin docchat-server -- --host 0.0.0.0 --port 8080
//! ```
//!
//! Backends follow `deployment.mode` (`APP_ENV`): development uses the local
//! session file and the embedded index, production uses Redis and the remote
//! vector store.

use anyhow::Context;
use clap::Parser;
use docchat::config::LoggingConfig;
use docchat::protocol::rest;
use docchat::protocol::Handler;
use docchat::Config;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "docchat-server", version, about = "docchat REST server")]
struct Args {
    /// Configuration file (defaults to config.toml + config.local.toml + environment)
    #[arg(long, short)]
    config: Option<String>,

    /// HTTP bind address
    #[arg(long)]
    host: Option<String>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Log file; stderr when unset
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if args.log_file.is_some() {
        config.logging.file = args.log_file;
    }

    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        mode = %config.deployment.mode,
        max_sessions = config.session.max_sessions,
        max_files_per_session = config.session.max_files_per_session,
        "starting docchat"
    );

    let handler = Arc::new(
        Handler::from_config(&config)
            .await
            .context("failed to initialize docchat")?,
    );

    let settled = handler.reconcile().await;
    if settled > 0 {
        tracing::info!(settled, "settled purges left over from the previous run");
    }

    rest::start_http_server(handler, &config.http)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    // RUST_LOG takes precedence over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging_config.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = logging_config.format.eq_ignore_ascii_case("json");

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match &logging_config.file {
        Some(path) => {
            let file = match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("ERROR: Unable to open log file '{}': {e}", path.display());
                    return;
                }
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = TRACE_GUARD.set(guard);

            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_writer(non_blocking);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
        None => {
            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}
