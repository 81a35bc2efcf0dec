//! Operator-side sampling parameter overrides.

use serde::Deserialize;

/// Optional scalar overrides applied over the client-supplied sampling
/// parameters. Each field replaces the client value independently; unset
/// fields leave the client value untouched.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterOverrides {
    /// Replacement for the client's `max_tokens`.
    pub max_tokens: Option<u32>,
    /// Replacement for the client's `temperature`, in `[0, 1]`.
    pub temperature: Option<f32>,
    /// Replacement for the client's `top_p`, in `[0, 1]`.
    pub top_p: Option<f32>,
    /// Replacement for the client's `top_k`, at least 1.
    pub top_k: Option<u32>,
}
