use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Anthropic-to-OpenAI protocol translation proxy.
#[derive(Debug, Parser)]
#[command(name = "prism", version)]
pub(crate) struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "PRISM_CONFIG", default_value = "prism.toml")]
    pub config: PathBuf,

    /// Log filter, overriding logging.level from the configuration file.
    #[arg(long, env = "PRISM_LOG")]
    pub log_level: Option<String>,

    /// Listen address override, e.g. 127.0.0.1:8080.
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,
}
