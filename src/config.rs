//! Configuration for the Hashnode webhook proxy

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Base URL of the trusted origin, e.g. a Lambda function URL.
    /// Inbound paths are appended to this URL's path.
    #[serde(default)]
    pub origin_url: Option<String>,

    /// Shared HMAC secret for inbound deliveries.
    /// Prefer `webhook_secret_file` outside development.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// File holding the shared HMAC secret. Takes precedence over `webhook_secret`.
    #[serde(default)]
    pub webhook_secret_file: Option<PathBuf>,

    /// How long a fetched secret is reused, in seconds. 0 disables caching.
    #[serde(default = "default_secret_cache_secs")]
    pub secret_cache_secs: u64,

    /// Allowed clock skew for signature timestamps, in seconds. 0 disables the check.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,

    /// SigV4 service name for the origin.
    #[serde(default = "default_signing_service")]
    pub signing_service: String,

    /// SigV4 region. When unset, derived from the origin host and then `aws_region`.
    #[serde(default)]
    pub signing_region: Option<String>,

    /// Fallback AWS region.
    #[serde(default = "default_region")]
    pub aws_region: String,

    /// Static credentials. When unset, `AWS_*` environment variables are read per request.
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,

    /// Maximum inbound body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Timeout for the forwarded request, in seconds
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,

    /// Log level filter string. Overridden by RUST_LOG.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Static SigV4 credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("origin_url", &self.origin_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("webhook_secret_file", &self.webhook_secret_file)
            .field("secret_cache_secs", &self.secret_cache_secs)
            .field("tolerance_secs", &self.tolerance_secs)
            .field("signing_service", &self.signing_service)
            .field("signing_region", &self.signing_region)
            .field("aws_region", &self.aws_region)
            .field("credentials", &self.credentials)
            .field("max_body_size", &self.max_body_size)
            .field("forward_timeout_secs", &self.forward_timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

// Default value functions for serde
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_secret_cache_secs() -> u64 {
    5
}

fn default_tolerance_secs() -> u64 {
    crate::webhook::DEFAULT_TOLERANCE_SECS
}

fn default_signing_service() -> String {
    "lambda".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_forward_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "hashnode_webhook_proxy=debug,tower_http=debug".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            origin_url: None,
            webhook_secret: None,
            webhook_secret_file: None,
            secret_cache_secs: default_secret_cache_secs(),
            tolerance_secs: default_tolerance_secs(),
            signing_service: default_signing_service(),
            signing_region: None,
            aws_region: default_region(),
            credentials: None,
            max_body_size: default_max_body_size(),
            forward_timeout_secs: default_forward_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HWP_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }

        config.origin_url = std::env::var("HWP_ORIGIN_URL").ok();
        config.webhook_secret = std::env::var("HWP_WEBHOOK_SECRET").ok();
        config.webhook_secret_file = std::env::var("HWP_WEBHOOK_SECRET_FILE")
            .ok()
            .map(PathBuf::from);

        if let Ok(secs) = std::env::var("HWP_SECRET_CACHE_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.secret_cache_secs = parsed;
            }
        }

        if let Ok(secs) = std::env::var("HWP_TOLERANCE_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.tolerance_secs = parsed;
            }
        }

        if let Ok(service) = std::env::var("HWP_SIGNING_SERVICE") {
            config.signing_service = service;
        }
        config.signing_region = std::env::var("HWP_SIGNING_REGION").ok();
        if let Ok(region) = std::env::var("AWS_REGION") {
            config.aws_region = region;
        }

        if let Ok(size) = std::env::var("HWP_MAX_BODY_SIZE") {
            if let Ok(parsed) = size.parse() {
                config.max_body_size = parsed;
            }
        }

        if let Ok(secs) = std::env::var("HWP_FORWARD_TIMEOUT_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.forward_timeout_secs = parsed;
            }
        }

        if let Ok(level) = std::env::var("HWP_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Load configuration from `HWP_CONFIG` or a default path if one exists,
    /// otherwise from environment. A config file that exists but cannot be
    /// read or parsed is an error.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("HWP_CONFIG") {
            return Self::from_file(&path).map_err(|e| e.in_file(&path));
        }
        Self::load_from(&[
            "hashnode_webhook_proxy.toml",
            "/etc/hashnode_webhook_proxy/config.toml",
        ])
    }

    /// First existing file in `paths`, else environment.
    fn load_from(paths: &[&str]) -> Result<Self, ConfigError> {
        for path in paths {
            if std::path::Path::new(path).exists() {
                return Self::from_file(path).map_err(|e| e.in_file(path));
            }
        }
        Ok(Self::from_env())
    }

    /// Check that the config can run a proxy: an origin URL with a host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self
            .origin_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("origin_url is required".to_string()))?;
        let url = reqwest::Url::parse(origin)
            .map_err(|e| ConfigError::Invalid(format!("origin_url {}: {}", origin, e)))?;
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "origin_url {} has no host",
                origin
            )));
        }
        if self.signing_service.is_empty() {
            return Err(ConfigError::Invalid(
                "signing_service must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if a webhook secret source is configured.
    pub fn secret_configured(&self) -> bool {
        self.webhook_secret_file.is_some() || self.webhook_secret.is_some()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn in_file(self, path: &str) -> Self {
        match self {
            ConfigError::Io(e) => ConfigError::Io(format!("{}: {}", path, e)),
            ConfigError::Parse(e) => ConfigError::Parse(format!("{}: {}", path, e)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.tolerance_secs, 30);
        assert_eq!(config.signing_service, "lambda");
        assert!(config.origin_url.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_parse() {
        let toml = r#"
            listen_addr = "127.0.0.1:9090"
            origin_url = "https://abc123.lambda-url.eu-central-1.on.aws/"
            webhook_secret_file = "/run/secrets/hashnode"
            tolerance_secs = 60

            [credentials]
            access_key_id = "AKID"
            secret_access_key = "shh"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listen_addr.port(), 9090);
        assert_eq!(config.tolerance_secs, 60);
        assert_eq!(
            config.webhook_secret_file,
            Some(PathBuf::from("/run/secrets/hashnode"))
        );
        let credentials = config.credentials.as_ref().unwrap();
        assert_eq!(credentials.access_key_id, "AKID");
        assert!(credentials.session_token.is_none());
        assert!(config.secret_configured());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        let config = Config {
            origin_url: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            origin_url: Some("unix:/tmp/sock".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = Config {
            webhook_secret: Some("whsec_very_secret".to_string()),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("whsec_very_secret"));
        assert!(rendered.contains("webhook_secret: Some(\"<redacted>\")"));
    }

    #[test]
    fn test_load_reports_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "tolerance_secs = \"not a number\"").unwrap();
        let path = path.to_str().unwrap();

        match Config::load_from(&[path]) {
            Err(ConfigError::Parse(message)) => assert!(message.contains(path)),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_skips_missing_files() {
        let config = Config::load_from(&["/nonexistent/hwp/config.toml"]).unwrap();
        assert_eq!(config.signing_service, "lambda");
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let credentials = CredentialsConfig {
            access_key_id: "AKID".into(),
            secret_access_key: "very-secret".into(),
            session_token: None,
        };
        assert!(!format!("{:?}", credentials).contains("very-secret"));
    }
}
