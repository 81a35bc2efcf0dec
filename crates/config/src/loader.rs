use std::path::Path;

use anyhow::bail;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    if config.models.default.is_none() {
        log::warn!("models.default is not set, inbound model names will be forwarded unchanged");
    }

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let overrides = &config.parameter_overrides;

    if let Some(max_tokens) = overrides.max_tokens
        && max_tokens == 0
    {
        bail!("parameter_overrides.max_tokens must be a positive integer");
    }

    if let Some(temperature) = overrides.temperature
        && !(0.0..=1.0).contains(&temperature)
    {
        bail!("parameter_overrides.temperature must be between 0.0 and 1.0");
    }

    if let Some(top_p) = overrides.top_p
        && !(0.0..=1.0).contains(&top_p)
    {
        bail!("parameter_overrides.top_p must be between 0.0 and 1.0");
    }

    if let Some(top_k) = overrides.top_k
        && top_k == 0
    {
        bail!("parameter_overrides.top_k must be at least 1");
    }

    if config.request_timeout_seconds == 0 {
        bail!("request_timeout_seconds must be at least 1");
    }

    Ok(())
}
