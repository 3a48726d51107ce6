//! Webhook proxy request handlers
//!
//! Split into submodules by domain:
//! - `proxy`: verify, re-sign and forward webhook deliveries
//! - `status`: health check

mod proxy;
mod status;

use crate::config::{Config, ConfigError};
use crate::metrics::{http_metrics_middleware, metrics_handler, Metrics};
use crate::secrets::{CredentialProvider, SecretProvider};
use crate::signing::SigV4Signer;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use proxy::proxy_webhook;
pub use status::{health_check, HealthResponse};

/// Where verified deliveries are forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
    /// Path prefix with no trailing slash (empty for the root).
    pub base_path: String,
}

impl Origin {
    pub fn parse(origin_url: &str) -> Result<Self, ConfigError> {
        let url = reqwest::Url::parse(origin_url)
            .map_err(|e| ConfigError::Invalid(format!("origin_url {}: {}", origin_url, e)))?;
        let hostname = url
            .host_str()
            .ok_or_else(|| ConfigError::Invalid(format!("origin_url {} has no host", origin_url)))?
            .to_string();
        Ok(Self {
            protocol: format!("{}:", url.scheme()),
            hostname,
            port: url.port(),
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Append an inbound request path to the origin's base path.
    pub fn join_path(&self, path: &str) -> String {
        format!("{}/{}", self.base_path, path.trim_start_matches('/'))
    }

    /// Region embedded in a Lambda function URL host
    /// (`<url-id>.lambda-url.<region>.on.aws`).
    pub fn region_from_host(&self) -> Option<String> {
        let labels: Vec<&str> = self.hostname.split('.').collect();
        match labels.as_slice() {
            [_, "lambda-url", region, "on", "aws"] if !region.is_empty() => {
                Some(region.to_string())
            }
            _ => None,
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub origin: Origin,
    pub secrets: Arc<dyn SecretProvider>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub signer: SigV4Signer,
    pub http: reqwest::Client,
    pub tolerance_secs: u64,
    /// Region used for SigV4 scoping of forwarded requests.
    pub signing_region: String,
    pub metrics: Option<Metrics>,
}

impl AppState {
    /// Build state from config and already-constructed providers.
    pub fn from_config(
        config: &Config,
        secrets: Arc<dyn SecretProvider>,
        credentials: Arc<dyn CredentialProvider>,
        metrics: Option<Metrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let origin_url = config.origin_url.as_deref().unwrap_or_default();
        let origin = Origin::parse(origin_url)?;

        let signing_region = config
            .signing_region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| origin.region_from_host())
            .unwrap_or_else(|| config.aws_region.clone());

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.forward_timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        Ok(Self {
            origin,
            secrets,
            credentials,
            signer: SigV4Signer::default(),
            http,
            tolerance_secs: config.tolerance_secs,
            signing_region,
            metrics,
        })
    }
}

/// Build the router: health and metrics endpoints, everything else is a
/// webhook delivery.
pub fn router(state: Arc<AppState>, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_webhook)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http_metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}
