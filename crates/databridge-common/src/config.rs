//! Configuration management for DataBridge

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Main configuration structure for DataBridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend access configuration
    #[serde(default)]
    pub backend: BackendOptions,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML or JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| BridgeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: BridgeConfig = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| BridgeError::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| BridgeError::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::load(path).await,
            Some(path) => {
                tracing::warn!(
                    "Config file {} not found, using defaults",
                    path.as_ref().display()
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `DATABRIDGE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("DATABRIDGE_BIND_ADDRESS") {
            self.server.bind_address = bind;
        }
        if let Some(port) = lookup("DATABRIDGE_PORT") {
            self.server.port = parse_env("DATABRIDGE_PORT", &port)?;
        }
        if let Some(origins) = lookup("DATABRIDGE_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(limit) = lookup("DATABRIDGE_PAGE_LIMIT") {
            self.backend.page_limit = parse_env("DATABRIDGE_PAGE_LIMIT", &limit)?;
        }
        if let Some(timeout) = lookup("DATABRIDGE_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_env("DATABRIDGE_TIMEOUT_SECS", &timeout)?;
        }
        Ok(())
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.backend.page_limit == 0 {
            return Err(BridgeError::Config("backend.page_limit must be > 0".into()));
        }
        if self.backend.timeout_secs == 0 {
            return Err(BridgeError::Config("backend.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BridgeError::Config(format!("Invalid value for {}: {}", key, raw)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,
    pub port: u16,
    /// Answer CORS preflight requests
    pub enable_cors: bool,
    /// Origins allowed by CORS; empty means any origin
    pub allowed_origins: Vec<String>,
    /// Emit an HTTP span per request
    pub enable_tracing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5001,
            enable_cors: true,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5000".to_string(),
            ],
            enable_tracing: true,
        }
    }
}

/// Knobs shared by every backend call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Row limit for data previews
    pub page_limit: usize,
    /// Number of preview rows echoed as `samples`
    pub sample_size: usize,
    /// Upper bound for a single backend call
    pub timeout_secs: u64,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            page_limit: 100,
            sample_size: 5,
            timeout_secs: 30,
        }
    }
}

impl BackendOptions {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "databridge=info,tower_http=debug".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.backend.page_limit, 100);
        assert_eq!(config.backend.sample_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABRIDGE_PORT", "9090"),
            ("DATABRIDGE_PAGE_LIMIT", "25"),
            ("DATABRIDGE_ALLOWED_ORIGINS", "http://a.test, http://b.test"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.backend.page_limit, 25);
        assert_eq!(config.server.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_overrides(|key| (key == "DATABRIDGE_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_toml_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databridge.toml");
        tokio::fs::write(&path, "[backend]\npage_limit = 10\n").await.unwrap();

        let config = BridgeConfig::load(&path).await.unwrap();
        assert_eq!(config.backend.page_limit, 10);
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.server.port, 5001);
    }

    #[test]
    fn test_zero_page_limit_rejected() {
        let mut config = BridgeConfig::default();
        config.backend.page_limit = 0;
        assert!(config.validate().is_err());
    }
}
