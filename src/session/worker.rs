//! Mode workers: one dedicated execution unit per active mode
//!
//! A worker owns its mode's blocking engine work and reports its exit back
//! to the coordinator through the coordinator's own message queue, so mode
//! state only ever changes inside the actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::coordinator::SessionMsg;
use crate::engine::{Engine, EngineError, ModeId};

/// Handle to the currently active mode worker.
pub struct ModeWorker {
    pub mode: ModeId,
    pub generation: u64,
    engine: Arc<dyn Engine>,
    handle: JoinHandle<()>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ModeWorker {
    /// Spawn the worker for `mode`. Exactly one exists at a time.
    pub fn spawn(
        mode: ModeId,
        generation: u64,
        engine: Arc<dyn Engine>,
        msg_tx: mpsc::Sender<SessionMsg>,
        poll: Duration,
    ) -> Self {
        let task_engine = Arc::clone(&engine);
        let (stop_tx, handle) = match mode {
            ModeId::Realtime => (
                None,
                tokio::spawn(run_realtime(task_engine, generation, msg_tx)),
            ),
            ModeId::Longform => {
                let (tx, rx) = oneshot::channel();
                (
                    Some(tx),
                    tokio::spawn(run_longform(task_engine, generation, rx, msg_tx)),
                )
            }
            ModeId::Static => (
                None,
                tokio::spawn(run_static(task_engine, generation, poll, msg_tx)),
            ),
        };

        Self {
            mode,
            generation,
            engine,
            handle,
            stop_tx,
        }
    }

    /// Signal the worker to stop, in its mode's own way.
    pub fn signal_stop(&mut self) {
        match self.mode {
            ModeId::Realtime => {
                if let Err(e) = self.engine.stop() {
                    warn!(?e, "failed to stop realtime engine");
                }
            }
            ModeId::Longform => match self.stop_tx.take() {
                Some(tx) => {
                    let _ = tx.send(());
                }
                None => debug!("longform stop already signalled"),
            },
            // Static work is bounded and always left to finish.
            ModeId::Static => {}
        }
    }

    /// Wait for the worker task to finish, bounded by `timeout`.
    pub async fn join(self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.handle).await.is_err() {
            warn!(mode = %self.mode, ?timeout, "worker did not exit in time, proceeding");
        }
    }

    /// Drop the worker without waiting (static mode at shutdown).
    pub fn detach(self) {
        debug!(mode = %self.mode, "worker detached");
    }
}

async fn run_realtime(
    engine: Arc<dyn Engine>,
    generation: u64,
    msg_tx: mpsc::Sender<SessionMsg>,
) {
    // Blocks streaming transcript until the engine is stopped.
    let result = run_blocking({
        let engine = Arc::clone(&engine);
        move || engine.start()
    })
    .await;
    notify_exit(ModeId::Realtime, generation, result, &msg_tx).await;
}

async fn run_longform(
    engine: Arc<dyn Engine>,
    generation: u64,
    stop_rx: oneshot::Receiver<()>,
    msg_tx: mpsc::Sender<SessionMsg>,
) {
    let mut result = run_blocking({
        let engine = Arc::clone(&engine);
        move || engine.start()
    })
    .await;

    if result.is_ok() {
        // Recording runs until the coordinator signals stop. A closed
        // channel counts as a stop: better to transcribe than to leak.
        let _ = stop_rx.await;
        result = run_blocking({
            let engine = Arc::clone(&engine);
            move || engine.stop()
        })
        .await;
    }

    notify_exit(ModeId::Longform, generation, result, &msg_tx).await;
}

async fn run_static(
    engine: Arc<dyn Engine>,
    generation: u64,
    poll: Duration,
    msg_tx: mpsc::Sender<SessionMsg>,
) {
    let result = run_blocking({
        let engine = Arc::clone(&engine);
        move || engine.start()
    })
    .await;

    if result.is_ok() {
        // Completion is observed by polling, not signalled.
        while engine.is_busy() {
            tokio::time::sleep(poll).await;
        }
    }

    notify_exit(ModeId::Static, generation, result, &msg_tx).await;
}

/// Run a blocking engine call on the blocking pool.
async fn run_blocking<F>(f: F) -> Result<(), EngineError>
where
    F: FnOnce() -> Result<(), EngineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            warn!(?e, "blocking engine task failed");
            Err(EngineError::Task(e.to_string()))
        }
    }
}

async fn notify_exit(
    mode: ModeId,
    generation: u64,
    result: Result<(), EngineError>,
    msg_tx: &mpsc::Sender<SessionMsg>,
) {
    let msg = SessionMsg::WorkerExited {
        mode,
        generation,
        result,
    };
    if msg_tx.send(msg).await.is_err() {
        debug!(%mode, "coordinator gone, dropping worker exit notice");
    }
}
