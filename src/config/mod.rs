//! Configuration loading and validation.

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nostr_sdk::{Keys, PublicKey, ToBech32};

pub use schema::{Config, DEFAULT_CONFIG_FILE, OPENAI_API_KEY_ENV};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    InvalidKey { field: &'static str, reason: String },
    #[error("publickey {declared} does not belong to privatekey (derived {derived})")]
    KeyMismatch { declared: String, derived: String },
    #[error("{0}")]
    Invalid(String),
}

impl Config {
    /// Read and parse a config file, then apply environment fallbacks.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_json(&content)?;

        // Apply environment variable fallback for the API key
        if config.openai_api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV) {
                config.openai_api_key = key;
            }
        }

        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keys()?;

        if self.relays.is_empty() {
            return Err(ConfigError::Invalid("relays_url must list at least one relay".into()));
        }
        for url in &self.relays {
            if !url.starts_with("wss://") && !url.starts_with("ws://") {
                return Err(ConfigError::Invalid(format!(
                    "relay URL must start with ws:// or wss://: {url}"
                )));
            }
        }
        if let Some(listen) = &self.listen_relay {
            if !self.relays.contains(listen) {
                return Err(ConfigError::Invalid(format!(
                    "listen_relay {listen} is not one of relays_url"
                )));
            }
        }

        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "openai_apikey is empty and {OPENAI_API_KEY_ENV} is not set"
            )));
        }
        if !self.openai_base_url.starts_with("http://") && !self.openai_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "openai_base_url must start with http:// or https://".into(),
            ));
        }

        if !self.trigger_phrases.iter().any(|p| !p.is_empty()) {
            return Err(ConfigError::Invalid("trigger_phrases must not be empty".into()));
        }

        if self.summarize_timeout_secs == 0
            || self.lookup_timeout_secs == 0
            || self.connect_timeout_secs == 0
        {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }

        Ok(())
    }

    /// Parse the signing keys and check them against the declared identity.
    pub fn keys(&self) -> Result<Keys, ConfigError> {
        let keys = Keys::parse(self.private_key.trim()).map_err(|e| ConfigError::InvalidKey {
            field: "privatekey",
            reason: e.to_string(),
        })?;
        let declared =
            PublicKey::parse(self.public_key.trim()).map_err(|e| ConfigError::InvalidKey {
                field: "publickey",
                reason: e.to_string(),
            })?;

        if keys.public_key() != declared {
            return Err(ConfigError::KeyMismatch {
                declared: declared.to_bech32().unwrap_or_else(|_| declared.to_hex()),
                derived: keys
                    .public_key()
                    .to_bech32()
                    .unwrap_or_else(|_| keys.public_key().to_hex()),
            });
        }

        Ok(keys)
    }

    /// Relay carrying the mention subscription.
    pub fn listen_relay(&self) -> &str {
        self.listen_relay
            .as_deref()
            .or_else(|| self.relays.first().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
