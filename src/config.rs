//! Configuration module
//!
//! Reads TOML from `~/.config/oioi-bridge/config.toml` (overridable via
//! the `OIOI_BRIDGE_CONFIG` environment variable). Every section has
//! full defaults so a missing or partial file still yields a runnable
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapter::{AdapterConfig, DEFAULT_CONCURRENCY};
use crate::domain::BridgeError;
use crate::partner::PartnerClientConfig;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub partner: PartnerSection,
    pub flush: FlushSection,
    pub capabilities: CapabilitiesSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
}

/// Partner API endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartnerSection {
    pub endpoint: String,
    pub api_key: String,
    /// Identifier scoping session uploads to an upstream tenant
    pub partner_identifier: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for PartnerSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.plugsurfing.com/api/v4/request".to_string(),
            api_key: String::new(),
            partner_identifier: None,
            request_timeout_secs: 10,
        }
    }
}

/// Flush timer and batching parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlushSection {
    pub data_interval_secs: u64,
    pub status_interval_secs: u64,
    pub cdr_interval_secs: u64,
    pub max_concurrent_uploads: usize,
    pub lock_timeout_secs: u64,
}

impl Default for FlushSection {
    fn default() -> Self {
        Self {
            data_interval_secs: 60,
            status_interval_secs: 15,
            cdr_interval_secs: 30,
            max_concurrent_uploads: DEFAULT_CONCURRENCY,
            lock_timeout_secs: 5,
        }
    }
}

/// Capability flags; a disabled capability short-circuits its public
/// operation to an AdminDown outcome.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilitiesSection {
    pub push_data: bool,
    pub push_status: bool,
    pub authentication: bool,
    pub send_cdrs: bool,
}

impl Default for CapabilitiesSection {
    fn default() -> Self {
        Self {
            push_data: true,
            push_status: true,
            authentication: true,
            send_cdrs: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level filter, e.g. "info" or "oioi_bridge=debug"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| BridgeError::Config(format!("parse {}: {e}", path.display())))
    }

    /// Build the adapter sub-config.
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            partner_identifier: self.partner.partner_identifier.clone(),
            data_flush_interval: Duration::from_secs(self.flush.data_interval_secs),
            status_flush_interval: Duration::from_secs(self.flush.status_interval_secs),
            cdr_flush_interval: Duration::from_secs(self.flush.cdr_interval_secs),
            max_concurrent_uploads: self.flush.max_concurrent_uploads,
            lock_timeout: Duration::from_secs(self.flush.lock_timeout_secs),
            push_data_enabled: self.capabilities.push_data,
            push_status_enabled: self.capabilities.push_status,
            authentication_enabled: self.capabilities.authentication,
            send_cdrs_enabled: self.capabilities.send_cdrs,
        }
    }

    /// Build the HTTP client sub-config.
    pub fn partner_client_config(&self) -> PartnerClientConfig {
        PartnerClientConfig {
            endpoint: self.partner.endpoint.clone(),
            api_key: self.partner.api_key.clone(),
            timeout: Duration::from_secs(self.partner.request_timeout_secs),
        }
    }
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oioi-bridge")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.flush.data_interval_secs, 60);
        assert_eq!(config.flush.max_concurrent_uploads, DEFAULT_CONCURRENCY);
        assert!(config.capabilities.push_data);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [partner]
            endpoint = "https://partner.test/api/v4/request"
            api_key = "secret"

            [capabilities]
            send_cdrs = false
            "#,
        )
        .unwrap();

        assert_eq!(config.partner.endpoint, "https://partner.test/api/v4/request");
        assert_eq!(config.partner.api_key, "secret");
        assert!(!config.capabilities.send_cdrs);
        // Untouched sections keep their defaults
        assert!(config.capabilities.push_data);
        assert_eq!(config.flush.status_interval_secs, 15);
    }

    #[test]
    fn adapter_config_reflects_flags() {
        let mut config = AppConfig::default();
        config.capabilities.push_status = false;
        config.flush.max_concurrent_uploads = 8;

        let adapter = config.adapter_config();
        assert!(!adapter.push_status_enabled);
        assert_eq!(adapter.max_concurrent_uploads, 8);
    }
}
