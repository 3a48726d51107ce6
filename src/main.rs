//! Hashnode webhook proxy - signature-verifying, SigV4 re-signing edge proxy

use clap::Parser;
use hashnode_webhook_proxy::api::handlers::{router, AppState};
use hashnode_webhook_proxy::config::Config;
use hashnode_webhook_proxy::metrics::Metrics;
use hashnode_webhook_proxy::secrets::{
    CachedSecretProvider, CredentialProvider, EnvCredentialProvider, FileSecretProvider,
    SecretProvider, StaticCredentialProvider, StaticSecretProvider,
};
use hashnode_webhook_proxy::signing::SigningCredential;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hashnode webhook proxy - verifies deliveries and forwards them under SigV4
#[derive(Parser, Debug)]
#[command(name = "hashnode_webhook_proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Origin URL (overrides config)
    #[arg(short, long, value_name = "URL")]
    origin: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Initialize tracing
    let log_level = if cli.verbose {
        "hashnode_webhook_proxy=trace,tower_http=trace".to_string()
    } else {
        config.log_level.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // CLI overrides
    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }
    if let Some(ref origin) = cli.origin {
        config.origin_url = Some(origin.clone());
    }
    config.validate()?;

    info!("Starting Hashnode webhook proxy");
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Origin: {}",
        config.origin_url.as_deref().unwrap_or_default()
    );
    info!("  Signing service: {}", config.signing_service);
    if config.tolerance_secs == 0 {
        warn!("  Replay window check is DISABLED: old deliveries will be accepted");
    } else {
        info!("  Replay tolerance: {}s", config.tolerance_secs);
    }

    let secrets = build_secret_provider(&config);
    let credentials = build_credential_provider(&config);
    let metrics = Metrics::new();

    let state = Arc::new(AppState::from_config(
        &config,
        secrets,
        credentials,
        Some(metrics),
    )?);
    info!("  Signing region: {}", state.signing_region);

    let app = router(state, config.max_body_size);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        "Hashnode webhook proxy listening on http://{}",
        config.listen_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_secret_provider(config: &Config) -> Arc<dyn SecretProvider> {
    let ttl = Duration::from_secs(config.secret_cache_secs);
    match (&config.webhook_secret_file, &config.webhook_secret) {
        (Some(path), _) => {
            info!("  Webhook secret: file {:?}", path);
            let provider = FileSecretProvider::new(path.clone());
            if ttl.is_zero() {
                Arc::new(provider)
            } else {
                Arc::new(CachedSecretProvider::new(provider, ttl))
            }
        }
        (None, secret) => {
            if !config.secret_configured() {
                warn!("  Webhook secret: NOT configured: every delivery will be rejected");
            }
            Arc::new(StaticSecretProvider::new(secret.clone()))
        }
    }
}

fn build_credential_provider(config: &Config) -> Arc<dyn CredentialProvider> {
    match &config.credentials {
        Some(c) => {
            info!("  Credentials: static ({})", c.access_key_id);
            Arc::new(StaticCredentialProvider::new(SigningCredential::new(
                c.access_key_id.clone(),
                c.secret_access_key.clone(),
                c.session_token.clone(),
                config.aws_region.clone(),
                config.signing_service.clone(),
            )))
        }
        None => {
            if std::env::var("AWS_ACCESS_KEY_ID").is_err() {
                warn!("  Credentials: AWS_ACCESS_KEY_ID not set: the origin will reject forwarded requests");
            }
            Arc::new(EnvCredentialProvider::new(
                config.aws_region.clone(),
                config.signing_service.clone(),
            ))
        }
    }
}

/// Handle shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
