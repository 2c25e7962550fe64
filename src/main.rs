//! env-injector - Kubernetes mutating admission webhook for Pods

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use env_injector::webhook::{webhook_router, WebhookState};
use env_injector::Config;

/// env-injector - mutating webhook that injects environment variables and
/// scheduling settings into pods at admission time
#[derive(Parser, Debug)]
#[command(name = "env-injector", version, about, long_about = None)]
struct Cli {
    /// Webhook server port
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 443)]
    port: u16,

    /// File containing the x509 certificate for HTTPS
    #[arg(
        long,
        env = "WEBHOOK_TLS_CERT",
        default_value = "/etc/webhook/certs/cert.pem"
    )]
    tls_cert_file: PathBuf,

    /// File containing the x509 private key matching the certificate
    #[arg(
        long,
        env = "WEBHOOK_TLS_KEY",
        default_value = "/etc/webhook/certs/key.pem"
    )]
    tls_key_file: PathBuf,

    /// File containing the mutation configuration
    #[arg(
        long,
        env = "WEBHOOK_CONFIG",
        default_value = "/etc/webhook/config/envconfig.yaml"
    )]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider - FIPS-validated aws-lc-rs
    // This MUST succeed for the application to operate securely.
    // Failure here indicates a serious system configuration issue.
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install FIPS-validated crypto provider: {:?}. \
             The application cannot operate securely without a working TLS implementation. \
             This may indicate aws-lc-rs was not compiled correctly or there is a \
             conflict with another crypto provider.",
            e
        );
        std::process::exit(1);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config_file)
        .map_err(|e| anyhow::anyhow!("Failed to load config file {:?}: {}", cli.config_file, e))?;

    let state = Arc::new(WebhookState::new(Arc::new(config)));
    let router = webhook_router(state);

    let cert = tokio::fs::read(&cli.tls_cert_file).await.map_err(|e| {
        anyhow::anyhow!("Failed to read TLS certificate {:?}: {}", cli.tls_cert_file, e)
    })?;
    let key = tokio::fs::read(&cli.tls_key_file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read TLS key {:?}: {}", cli.tls_key_file, e))?;
    let tls_config = RustlsConfig::from_pem(cert, key)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to build TLS config: {}", e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(addr = %addr, "Starting webhook server");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Webhook server error: {}", e))?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM, then drain in-flight requests before
/// stopping the server.
async fn graceful_shutdown(handle: Handle) {
    shutdown_signal().await;
    info!("Received shutdown signal, draining webhook server");
    handle.graceful_shutdown(Some(Duration::from_secs(30)));
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(error = %error, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(error = %error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
