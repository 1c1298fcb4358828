//! Periodic pruning of revocation records
//!
//! A revocation record is useless once the token it names has expired, so
//! this task deletes such records at a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::database::Database;

use super::manager::AuthManager;

/// Background task deleting expired revocation records
pub struct RevocationPruner<D: Database> {
    auth_manager: Arc<AuthManager<D>>,
    interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<D: Database + 'static> RevocationPruner<D> {
    /// Create a new pruner
    ///
    /// The first run happens one `interval` after `run` is called.
    pub fn new(
        auth_manager: Arc<AuthManager<D>>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            auth_manager,
            interval,
            shutdown_rx,
        }
    }

    /// Run until the shutdown signal is received
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Starting revocation pruner");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping revocation pruner");
                    break;
                }
                _ = ticker.tick() => {
                    match self.auth_manager.prune_revocations().await {
                        Ok(count) => debug!(count, "Revocation prune finished"),
                        Err(e) => error!(error = %e, "Revocation prune failed"),
                    }
                }
            }
        }
    }
}
