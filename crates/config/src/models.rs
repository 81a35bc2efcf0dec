//! Model routing slots.
//!
//! Inbound Anthropic model names never reach the upstream directly (unless no
//! default slot is configured); the rewriter resolves them against these
//! slots instead.

use serde::Deserialize;

/// Upstream model identifiers for the routing slots.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    /// Target for sonnet-class requests and the starting point of every
    /// resolution. When unset, the client's model string passes through
    /// unchanged.
    pub default: Option<String>,
    /// Target for haiku-class requests.
    pub small: Option<String>,
    /// Target for requests with thinking enabled.
    pub think: Option<String>,
    /// Reserved slot for tool-heavy requests.
    pub tool: Option<String>,
    /// Target once the prompt estimate crosses the long-context threshold.
    #[serde(alias = "longContext")]
    pub long_context: Option<String>,
}
