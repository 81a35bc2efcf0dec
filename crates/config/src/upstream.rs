//! Upstream OpenAI-compatible endpoint settings.

use secrecy::SecretString;
use serde::Deserialize;

/// Where chat completions are forwarded to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiConfig {
    /// Base URL of the OpenAI-compatible API, without the
    /// `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer token attached to upstream requests.
    pub api_key: Option<SecretString>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        }
    }
}
