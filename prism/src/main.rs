use std::{sync::Arc, time::Duration};

use args::Args;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod args;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = config::Config::load(&args.config)?;

    let listen_address = args
        .listen
        .unwrap_or_else(|| config.server.listen_address());

    let log_filter = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    let config = config::spawn_watcher(args.config.clone(), Arc::new(config), CONFIG_POLL_INTERVAL);

    let shutdown_signal = CancellationToken::new();

    {
        let shutdown_signal = shutdown_signal.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown_signal.cancel();
            }
        });
    }

    server::serve(server::ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
