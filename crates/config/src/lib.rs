//! Prism configuration structures to map the prism.toml configuration.

#![deny(missing_docs)]

mod loader;
mod logging;
mod models;
mod overrides;
mod server;
mod upstream;
mod watcher;

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

pub use logging::LoggingConfig;
pub use models::ModelsConfig;
pub use overrides::ParameterOverrides;
pub use server::ServerConfig;
pub use upstream::OpenAiConfig;
pub use watcher::{ConfigReceiver, spawn_watcher};

/// Main configuration structure for the Prism application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Client-side authentication token. When unset, inbound auth is disabled.
    pub api_key: Option<SecretString>,
    /// Upstream OpenAI-compatible endpoint settings.
    pub openai: OpenAiConfig,
    /// Model routing slots.
    pub models: ModelsConfig,
    /// Operator-side sampling parameter overrides.
    pub parameter_overrides: ParameterOverrides,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// End-to-end deadline applied to each upstream exchange.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates parameter ranges and the timeout.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}
