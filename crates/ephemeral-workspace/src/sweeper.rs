//! Background task that periodically evicts expired artifacts.

use crate::{policy::RetentionPolicy, registry::ArtifactRegistry};
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

/// Drives `ArtifactRegistry::sweep_expired` on a fixed interval.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    registry: ArtifactRegistry,
    ttl: Duration,
    interval: Duration,
}

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RetentionSweeper {
    pub fn new(registry: ArtifactRegistry, policy: RetentionPolicy) -> Self {
        Self {
            registry,
            ttl: policy.retention,
            interval: policy.effective_sweep_interval(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single sweep now.
    pub async fn sweep_once(&self) -> usize {
        let evicted = self.registry.sweep_expired(self.ttl).await;
        if evicted > 0 {
            tracing::info!("Cleaned up {} expired artifacts", evicted);
        } else {
            tracing::trace!("Sweep found no expired artifacts");
        }
        evicted
    }

    /// Spawn the sweep loop onto the current runtime.
    ///
    /// The first sweep runs one full interval after spawning.
    pub fn spawn(self) -> SweeperHandle {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() completes its first tick immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = child.cancelled() => {
                        tracing::debug!("Retention sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        });

        SweeperHandle { token, task }
    }
}

impl SweeperHandle {
    /// A token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop the loop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Retention sweeper task failed: {}", e);
        }
    }
}
