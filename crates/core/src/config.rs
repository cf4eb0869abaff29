//! TOML-based configuration system for Warden.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Warden configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    pub warden: WardenSection,
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Core Warden instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenSection {
    pub instance_name: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_port() -> u16 {
    8080
}

/// Remote directory service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub api_key: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_users_url")]
    pub users_url: String,
    pub organization_id: i64,
}

fn default_auth_url() -> String {
    "https://auth.directory.example.com".into()
}

fn default_users_url() -> String {
    "https://users.directory.example.com".into()
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Shared secret required in the `x-api-key` header of mutating requests.
    #[serde(default)]
    pub api_secret_key: String,
}

/// Object-storage settings for cached sync inputs and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL, for LocalStack-style testing.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_roster_key")]
    pub roster_key: String,
    #[serde(default = "default_mapping_key")]
    pub mapping_key: String,
    #[serde(default = "default_results_prefix")]
    pub results_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            roster_key: default_roster_key(),
            mapping_key: default_mapping_key(),
            results_prefix: default_results_prefix(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_roster_key() -> String {
    "input/roster.csv".into()
}

fn default_mapping_key() -> String {
    "input/mapping.csv".into()
}

fn default_results_prefix() -> String {
    "results/".into()
}

impl WardenConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WardenError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if self.warden.instance_name.is_empty() {
            return Err(WardenError::Config(
                "warden.instance_name must not be empty".into(),
            ));
        }

        if self.directory.api_key.is_empty() {
            return Err(WardenError::Config(
                "directory.api_key must not be empty".into(),
            ));
        }

        if self.directory.auth_url.is_empty() {
            return Err(WardenError::Config(
                "directory.auth_url must not be empty".into(),
            ));
        }

        if self.directory.users_url.is_empty() {
            return Err(WardenError::Config(
                "directory.users_url must not be empty".into(),
            ));
        }

        if self.server.api_secret_key.is_empty() {
            return Err(WardenError::Config(
                "server.api_secret_key must not be empty".into(),
            ));
        }

        if self.storage.enabled {
            if self.storage.bucket.is_empty() {
                return Err(WardenError::Config(
                    "storage.bucket is required when storage is enabled".into(),
                ));
            }
            if self.storage.roster_key.is_empty() {
                return Err(WardenError::Config(
                    "storage.roster_key is required when storage is enabled".into(),
                ));
            }
            if self.storage.mapping_key.is_empty() {
                return Err(WardenError::Config(
                    "storage.mapping_key is required when storage is enabled".into(),
                ));
            }
        }

        Ok(())
    }
}
