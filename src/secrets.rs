//! Providers for the webhook secret and the re-signing credentials.
//!
//! Both are constructed once in `main` and shared through `AppState`. The
//! verification and signing code only ever sees the values they return.

use crate::signing::SigningCredential;
use async_trait::async_trait;
use moka::sync::Cache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

/// Secret errors
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secret from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("secret is not configured")]
    NotConfigured,
}

/// Source of the shared HMAC secret for inbound deliveries.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn secret(&self) -> Result<Zeroizing<String>, SecretError>;
}

/// A secret fixed at startup.
pub struct StaticSecretProvider {
    secret: Option<Zeroizing<String>>,
}

impl StaticSecretProvider {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(Zeroizing::new),
        }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn secret(&self) -> Result<Zeroizing<String>, SecretError> {
        self.secret.clone().ok_or(SecretError::NotConfigured)
    }
}

/// Reads the secret from a file on every call (trailing whitespace trimmed),
/// so a mounted secret can be replaced without a restart.
pub struct FileSecretProvider {
    path: PathBuf,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn secret(&self) -> Result<Zeroizing<String>, SecretError> {
        let content = Zeroizing::new(tokio::fs::read_to_string(&self.path).await.map_err(
            |source| SecretError::Io {
                path: self.path.display().to_string(),
                source,
            },
        )?);
        Ok(Zeroizing::new(content.trim().to_string()))
    }
}

/// Caches another provider's secret for a fixed TTL. Errors are not cached.
pub struct CachedSecretProvider<P> {
    inner: P,
    cache: Cache<(), Arc<Zeroizing<String>>>,
}

impl<P: SecretProvider> CachedSecretProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl<P: SecretProvider> SecretProvider for CachedSecretProvider<P> {
    async fn secret(&self) -> Result<Zeroizing<String>, SecretError> {
        if let Some(hit) = self.cache.get(&()) {
            return Ok(Zeroizing::new(hit.as_str().to_string()));
        }
        debug!("Secret cache miss, fetching from provider");
        let secret = self.inner.secret().await?;
        self.cache.insert((), Arc::new(secret.clone()));
        Ok(secret)
    }
}

/// Source of SigV4 credentials for forwarding.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> SigningCredential;
}

/// Credentials fixed at startup.
pub struct StaticCredentialProvider {
    credential: SigningCredential,
}

impl StaticCredentialProvider {
    pub fn new(credential: SigningCredential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self) -> SigningCredential {
        self.credential.clone()
    }
}

/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
/// on every call. Missing variables become empty strings; the origin rejects
/// the resulting signature.
pub struct EnvCredentialProvider {
    region: String,
    service: String,
}

impl EnvCredentialProvider {
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credential(&self) -> SigningCredential {
        SigningCredential::new(
            std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            std::env::var("AWS_SESSION_TOKEN").ok(),
            self.region.clone(),
            self.service.clone(),
        )
    }
}
