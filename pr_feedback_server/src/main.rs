//! PR Feedback Server — relays GitHub pull-request webhooks to Bamboo.
//!
//! Verifies each delivery's `X-Hub-Signature` against the shared secret and,
//! for pull requests that gained new commits, queues the configured Bamboo
//! plan with the PR number and head sha as plan variables.

mod config;
mod metrics;
mod models;
mod routes;
mod services;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};

use crate::config::ServerConfig;
use crate::services::bamboo_service::BambooClient;

#[derive(Parser)]
#[command(name = "pr-feedback-server", about = "GitHub webhook to Bamboo build relay")]
struct Cli {
    /// JSON config file
    #[arg(short, long, env = "PR_FEEDBACK_CONFIG", default_value = "config/config.json")]
    config: PathBuf,

    /// Listen port (overrides `server_port` from the config file)
    #[arg(short, long, env = "PR_FEEDBACK_PORT")]
    port: Option<u16>,

    /// PEM certificate chain; serves HTTPS together with --ssl-key
    #[arg(long, env = "PR_FEEDBACK_SSL_CERT", requires = "ssl_key")]
    ssl_cert: Option<PathBuf>,

    /// PEM private key for --ssl-cert
    #[arg(long, env = "PR_FEEDBACK_SSL_KEY", requires = "ssl_cert")]
    ssl_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Post a signed fake pull-request delivery to a running server
    #[command(name = "send-test")]
    SendTest {
        /// Webhook URL, e.g. https://relay.example.com/gh
        #[arg(long)]
        url: String,
        #[arg(long)]
        pr_num: u64,
        #[arg(long)]
        commit_sha: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config);

    if let Some(Command::SendTest {
        url,
        pr_num,
        commit_sha,
    }) = cli.command
    {
        let status = services::test_delivery::send(&config, &url, pr_num, &commit_sha).await?;
        println!("{status}");
        return Ok(());
    }

    tracing::info!("Starting PR feedback server...");
    let port = cli.port.unwrap_or(config.server_port);
    let state = routes::AppState::new(config, Arc::new(BambooClient::new()));
    let app = routes::router(state);

    // Initialize metrics
    metrics::init_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    match (&cli.ssl_cert, &cli.ssl_key) {
        (Some(cert), Some(key)) => {
            let tls = tls_config(cert, key).await?;
            let handle = axum_server::Handle::new();
            tokio::spawn(shutdown_on_signal(handle.clone()));

            tracing::info!("PR feedback server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            tracing::info!("PR feedback server listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn tls_config(cert: &Path, key: &Path) -> anyhow::Result<RustlsConfig> {
    RustlsConfig::from_pem_file(cert, key).await.with_context(|| {
        format!(
            "failed to load TLS certificate {} / key {}",
            cert.display(),
            key.display()
        )
    })
}

async fn shutdown_on_signal(handle: axum_server::Handle) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
