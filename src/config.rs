use std::fmt;

use thiserror::Error;

/// Upper bound for the token lifetime (ten years)
pub const MAX_EXPIRE_PERIOD_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub node: NodeConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding users.json, tokens.json and proxy.json
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Primary proxy to fall back to when no cluster state was persisted.
    /// Empty disables replication until a primary is discovered.
    pub primary_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub cleanup_interval_seconds: u64,
    pub expire_period_seconds: u64,
    /// HMAC secret used to sign tokens
    pub secret: String,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("cleanup_interval_seconds", &self.cleanup_interval_seconds)
            .field("expire_period_seconds", &self.expire_period_seconds)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:52001".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            primary_url: String::new(),
            request_timeout_ms: 5000,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: 60,
            expire_period_seconds: 86400, // 24 hours
            secret: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_defaults = NodeConfig::default();
        let token_defaults = TokenConfig::default();
        let cluster_defaults = ClusterConfig::default();

        let config = Config {
            node: NodeConfig {
                bind_address: std::env::var("BIND_ADDRESS")
                    .unwrap_or(node_defaults.bind_address),
                data_dir: std::env::var("DATA_DIR").unwrap_or(node_defaults.data_dir),
            },
            cluster: ClusterConfig {
                primary_url: std::env::var("PRIMARY_URL")
                    .map(|url| url.trim().trim_end_matches('/').to_string())
                    .unwrap_or(cluster_defaults.primary_url),
                request_timeout_ms: parse_env("CLUSTER_REQUEST_TIMEOUT_MS")?
                    .unwrap_or(cluster_defaults.request_timeout_ms),
            },
            tokens: TokenConfig {
                cleanup_interval_seconds: parse_env("TOKEN_CLEANUP_INTERVAL")?
                    .unwrap_or(token_defaults.cleanup_interval_seconds),
                expire_period_seconds: parse_env("TOKEN_EXPIRE_SECONDS")?
                    .unwrap_or(token_defaults.expire_period_seconds),
                secret: std::env::var("AUTH_SECRET").unwrap_or_default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "AUTH_SECRET must be set".to_string(),
            ));
        }
        if self.tokens.expire_period_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "TOKEN_EXPIRE_SECONDS must be greater than zero".to_string(),
            ));
        }
        if self.tokens.expire_period_seconds > MAX_EXPIRE_PERIOD_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "TOKEN_EXPIRE_SECONDS cannot exceed {MAX_EXPIRE_PERIOD_SECONDS}"
            )));
        }
        if self.tokens.cleanup_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "TOKEN_CLEANUP_INTERVAL must be greater than zero".to_string(),
            ));
        }
        if self.node.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        let url = &self.cluster.primary_url;
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "PRIMARY_URL must be an http(s) URL, got '{url}'"
            )));
        }

        if self.tokens.secret.len() < 16 {
            tracing::warn!("AUTH_SECRET is shorter than 16 bytes; tokens are easier to forge");
        }

        Ok(())
    }
}

fn parse_env(name: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{name} must be a non-negative integer"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            cluster: ClusterConfig::default(),
            node: NodeConfig::default(),
            tokens: TokenConfig {
                secret: "a-test-secret-of-some-length".to_string(),
                ..TokenConfig::default()
            },
        }
    }

    #[test]
    fn test_defaults_are_valid_with_secret() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.node.bind_address, "0.0.0.0:52001");
        assert_eq!(config.tokens.expire_period_seconds, 86400);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let mut config = valid_config();
        config.tokens.secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_expire_period_is_rejected() {
        let mut config = valid_config();
        config.tokens.expire_period_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_primary_url_must_be_http() {
        let mut config = valid_config();
        config.cluster.primary_url = "proxy:8080".to_string();
        assert!(config.validate().is_err());

        config.cluster.primary_url = "http://proxy:8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = valid_config();
        let rendered = format!("{:?}", config.tokens);
        assert!(!rendered.contains("a-test-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
