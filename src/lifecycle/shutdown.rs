//! Signal handling and ordered teardown

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pool::ResourcePool;
use crate::session::SessionMsg;
use crate::supervisor::ProcessSupervisor;

/// Handles shutdown signals (SIGTERM, SIGINT)
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) {
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt())
            .expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered teardown of every long-lived unit.
///
/// Each step is independently guarded: one failure never aborts the rest.
/// Joins are bounded, accepting a possible leak over a hang.
pub struct ShutdownCoordinator {
    pub shutdown: watch::Sender<bool>,
    pub msg_tx: mpsc::Sender<SessionMsg>,
    pub coordinator: JoinHandle<()>,
    pub listener: JoinHandle<()>,
    pub supervisor: ProcessSupervisor,
    pub pool: Arc<ResourcePool>,
    pub join_timeout: Duration,
}

impl ShutdownCoordinator {
    pub async fn run(mut self) {
        info!("beginning ordered teardown");

        // 1. Flip the global running flag.
        if self.shutdown.send(true).is_err() {
            warn!("all shutdown watchers already gone");
        }

        // 2. Stop the active mode and retire the coordinator actor. On the
        // QUIT path the actor has already done both and the send just
        // bounces off its closed queue.
        if self.msg_tx.send(SessionMsg::Shutdown).await.is_err() {
            debug!("coordinator already stopped");
        }
        join_bounded("coordinator", self.coordinator, self.join_timeout).await;

        // 3. Terminate the companion process.
        self.supervisor.terminate().await;

        // 4. Retire the listener.
        join_bounded("listener", self.listener, self.join_timeout).await;

        // 5. Release every pooled engine.
        self.pool.release_all().await;

        info!("teardown complete");
    }
}

async fn join_bounded(unit: &str, handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => info!(unit, "stopped"),
        Ok(Err(e)) => warn!(unit, ?e, "unit panicked during teardown"),
        Err(_) => warn!(unit, ?timeout, "did not stop in time, proceeding"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineError, EngineFactory, ModeId};

    struct NoopFactory;

    impl EngineFactory for NoopFactory {
        fn build(&self, _mode: ModeId) -> Result<Arc<dyn Engine>, EngineError> {
            Err(EngineError::EmptyCommand)
        }
    }

    #[tokio::test]
    async fn test_teardown_survives_already_stopped_units() {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let (msg_tx, msg_rx) = mpsc::channel::<SessionMsg>(4);
        drop(msg_rx); // coordinator queue already closed

        let teardown = ShutdownCoordinator {
            shutdown: shutdown_tx,
            msg_tx,
            coordinator: tokio::spawn(async {}),
            listener: tokio::spawn(async {}),
            supervisor: ProcessSupervisor::new(vec!["true".to_string()], String::new()),
            pool: Arc::new(ResourcePool::new(Arc::new(NoopFactory))),
            join_timeout: Duration::from_millis(200),
        };

        // Every step is guarded; this must simply complete.
        teardown.run().await;
    }

    #[tokio::test]
    async fn test_teardown_proceeds_past_stuck_unit() {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let (msg_tx, mut msg_rx) = mpsc::channel::<SessionMsg>(4);
        tokio::spawn(async move {
            // Swallow the shutdown request without ever exiting.
            let _ = msg_rx.recv().await;
            std::future::pending::<()>().await;
        });

        let stuck = tokio::spawn(std::future::pending::<()>());
        let teardown = ShutdownCoordinator {
            shutdown: shutdown_tx,
            msg_tx,
            coordinator: stuck,
            listener: tokio::spawn(async {}),
            supervisor: ProcessSupervisor::new(vec!["true".to_string()], String::new()),
            pool: Arc::new(ResourcePool::new(Arc::new(NoopFactory))),
            join_timeout: Duration::from_millis(50),
        };

        tokio::time::timeout(Duration::from_secs(2), teardown.run())
            .await
            .expect("teardown hung on a stuck unit");
    }
}
