//! Configuration file model (`config.json`).

use nostr_core::{ProfileMetadata, DEFAULT_MIN_CONTENT_CHARS, DEFAULT_TRIGGER_PHRASES};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Environment fallback for the completion API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hex (or nsec) signing key.
    #[serde(rename = "privatekey")]
    pub private_key: String,
    /// Hex (or npub) identity; must be derived from `private_key`.
    #[serde(rename = "publickey")]
    pub public_key: String,
    /// Bearer credential for the completion API. Can also be set via OPENAI_API_KEY.
    #[serde(rename = "openai_apikey", default)]
    pub openai_api_key: String,
    /// Relay URLs (ws:// or wss://), in priority order.
    #[serde(rename = "relays_url")]
    pub relays: Vec<String>,
    /// Relay carrying the mention subscription. Defaults to the first relay.
    #[serde(default)]
    pub listen_relay: Option<String>,
    /// Substrings that arm a summary reply.
    #[serde(default = "default_trigger_phrases")]
    pub trigger_phrases: Vec<String>,
    /// Posts shorter than this many characters are not summarized.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_summarize_timeout_secs")]
    pub summarize_timeout_secs: u64,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Kind-0 descriptor published at startup.
    #[serde(default)]
    pub profile: ProfileMetadata,
    /// Log level used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Keys stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("openai_api_key", &"<redacted>")
            .field("relays", &self.relays)
            .field("listen_relay", &self.listen_relay)
            .field("trigger_phrases", &self.trigger_phrases)
            .field("min_content_chars", &self.min_content_chars)
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("summarize_timeout_secs", &self.summarize_timeout_secs)
            .field("lookup_timeout_secs", &self.lookup_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("profile", &self.profile)
            .field("log_level", &self.log_level)
            .finish()
    }
}

pub fn default_trigger_phrases() -> Vec<String> {
    DEFAULT_TRIGGER_PHRASES.iter().map(|p| p.to_string()).collect()
}

fn default_min_content_chars() -> usize {
    DEFAULT_MIN_CONTENT_CHARS
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".into()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_summarize_timeout_secs() -> u64 {
    60
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".into()
}
