//! Configuration module for R2 Uplink
//!
//! Configuration is an explicit value handed to the transfer procedures.
//! It is loaded either from a YAML file (with `${VAR}` expansion) or straight
//! from an [`EnvMap`], which snapshots the process environment and fills in
//! variables it does not set from a `.env` file. Nothing in this crate reads
//! the process environment after the [`EnvMap`] has been built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod env;
mod loader;

pub use env::EnvMap;
pub use loader::ConfigLoader;

/// Environment variable holding the Cloudflare account ID
pub const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
/// Environment variable holding the R2 access key ID
pub const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
/// Environment variable holding the R2 secret access key
pub const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
/// Optional endpoint override (e.g. copied from the bucket settings page)
pub const ENV_ENDPOINT_URL: &str = "R2_ENDPOINT_URL";
/// Optional dataset hub access token
pub const ENV_HUB_TOKEN: &str = "HF_TOKEN";
/// Optional dataset hub endpoint override
pub const ENV_HUB_ENDPOINT: &str = "HF_ENDPOINT";

/// 1 MiB
pub const MIB: u64 = 1024 * 1024;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// A value is unset when it is blank or still an unexpanded `${VAR}` placeholder.
fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || (value.starts_with("${") && value.ends_with('}'))
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub r2: R2Config,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

impl Config {
    /// Load configuration from a YAML file, expanding `${VAR}` against `env`
    ///
    /// A hub token missing from the file is taken from `HF_TOKEN`.
    pub fn load<P: AsRef<Path>>(path: P, env: &EnvMap) -> Result<Self, ConfigError> {
        let mut config = ConfigLoader::load(path, env)?;
        if config.hub.token().is_none() {
            config.hub.token = env.get(ENV_HUB_TOKEN).map(str::to_string);
        }
        Ok(config)
    }

    /// Build configuration from environment variables alone
    ///
    /// Missing R2 credentials are not an error here: commands that talk to R2
    /// call [`R2Config::validate`] themselves, while `fetch` never needs them.
    pub fn from_env(env: &EnvMap) -> Result<Self, ConfigError> {
        let mut hub = HubConfig::default();
        if let Some(endpoint) = env.get(ENV_HUB_ENDPOINT) {
            hub.endpoint = endpoint.to_string();
        }
        hub.token = env.get(ENV_HUB_TOKEN).map(str::to_string);

        let config = Self {
            r2: R2Config {
                account_id: env.get(ENV_ACCOUNT_ID).unwrap_or_default().to_string(),
                access_key_id: env.get(ENV_ACCESS_KEY_ID).unwrap_or_default().to_string(),
                secret_access_key: env
                    .get(ENV_SECRET_ACCESS_KEY)
                    .unwrap_or_default()
                    .to_string(),
                endpoint: env.get(ENV_ENDPOINT_URL).map(str::to_string),
            },
            upload: UploadConfig::default(),
            hub,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the parts of the configuration every command relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upload.validate()?;

        if let Some(endpoint) = self.r2.endpoint_override() {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid R2 endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if !is_valid_http_url(&self.hub.endpoint) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid hub endpoint '{}': must start with http:// or https://",
                self.hub.endpoint
            )));
        }

        Ok(())
    }
}

/// Cloudflare R2 connection settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct R2Config {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// Explicit endpoint URL; takes precedence over the account-derived one
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl R2Config {
    /// Check that all three credentials are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_unset(&self.account_id) {
            return Err(ConfigError::MissingCredential(ENV_ACCOUNT_ID));
        }
        if is_unset(&self.access_key_id) {
            return Err(ConfigError::MissingCredential(ENV_ACCESS_KEY_ID));
        }
        if is_unset(&self.secret_access_key) {
            return Err(ConfigError::MissingCredential(ENV_SECRET_ACCESS_KEY));
        }
        Ok(())
    }

    /// The endpoint override, if one is set to something meaningful
    pub fn endpoint_override(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !is_unset(e))
    }

    /// Endpoint URL: the override when present, otherwise derived from the account ID
    pub fn endpoint_url(&self) -> String {
        match self.endpoint_override() {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.r2.cloudflarestorage.com", self.account_id.trim()),
        }
    }
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Files larger than this many bytes go through multipart upload
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
    /// Bytes per part in multipart mode
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    /// Abort the multipart session when the transfer fails
    #[serde(default)]
    pub abort_on_failure: bool,
}

impl UploadConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.part_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.part_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            part_size: default_part_size(),
            abort_on_failure: false,
        }
    }
}

fn default_multipart_threshold() -> u64 {
    100 * MIB
}

fn default_part_size() -> u64 {
    100 * MIB
}

/// Dataset hub configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_hub_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_hub_endpoint(),
            token: None,
        }
    }
}

impl HubConfig {
    /// The access token, unless blank or an unexpanded `${VAR}` placeholder
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !is_unset(t))
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_hub_endpoint() -> String {
    "https://huggingface.co".to_string()
}
