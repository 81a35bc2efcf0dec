//! Configuration hot reload.
//!
//! A background task polls the configuration file and publishes a fresh
//! snapshot over a watch channel whenever its contents change. Readers hold
//! a [`ConfigReceiver`] and clone the current `Arc<Config>` once per request,
//! so an in-flight request never observes a mixed configuration. A reload
//! failure keeps the previous snapshot.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::Config;

/// Read side of the configuration channel. Cheap to clone.
pub type ConfigReceiver = watch::Receiver<Arc<Config>>;

/// Spawns the polling task and returns the snapshot receiver.
///
/// `poll_interval` controls how often the file is re-read; contents are
/// compared rather than mtimes so editors that preserve timestamps are still
/// picked up.
pub fn spawn_watcher(path: PathBuf, initial: Arc<Config>, poll_interval: Duration) -> ConfigReceiver {
    let (tx, rx) = watch::channel(initial);

    tokio::spawn(async move {
        let mut last_contents = std::fs::read_to_string(&path).unwrap_or_default();
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if tx.is_closed() {
                break;
            }

            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(error) => {
                    log::debug!("Configuration file {} is unreadable: {error}", path.display());
                    continue;
                }
            };

            if contents == last_contents {
                continue;
            }

            last_contents = contents;

            match Config::load(&path) {
                Ok(config) => {
                    log::info!("Configuration reloaded from {}", path.display());
                    let _ = tx.send(Arc::new(config));
                }
                Err(error) => {
                    log::error!("Configuration reload failed, keeping previous snapshot: {error}");
                }
            }
        }
    });

    rx
}
