//! The session coordinator: single owner of mode state
//!
//! Every start/stop decision and every worker-completion event flows
//! through one message queue, so the current mode can never be mutated
//! from two units at once. Arbitration rejections (busy, nothing to stop)
//! are ordinary outcomes, not errors, and never change state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::worker::ModeWorker;
use crate::command::Command;
use crate::engine::{EngineError, ModeId};
use crate::events::SessionEvent;
use crate::pool::ResourcePool;

/// Session-wide mode. At most one non-idle value exists at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No active mode, waiting for a command
    Idle,
    /// Real-time streaming transcription
    Realtime,
    /// Long-form recording, transcribed on stop
    Longform,
    /// One-shot file transcription
    Static,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Idle
    }
}

impl From<ModeId> for Mode {
    fn from(id: ModeId) -> Self {
        match id {
            ModeId::Realtime => Mode::Realtime,
            ModeId::Longform => Mode::Longform,
            ModeId::Static => Mode::Static,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Realtime => write!(f, "realtime"),
            Mode::Longform => write!(f, "longform"),
            Mode::Static => write!(f, "static"),
        }
    }
}

/// Messages processed by the coordinator actor.
#[derive(Debug)]
pub enum SessionMsg {
    /// A command received over the control channel
    Command(Command),

    /// The active worker finished: stopped, self-completed, or failed
    WorkerExited {
        mode: ModeId,
        generation: u64,
        result: Result<(), EngineError>,
    },

    /// Stop the active mode and retire the actor (process teardown)
    Shutdown,
}

/// The observable result of handling one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Started(ModeId),
    Stopped(ModeId),
    /// Rejected: another mode is active
    Busy { active: Mode },
    /// Rejected: the stop matched nothing
    NothingToStop,
    /// Engine acquisition failed; no mode was entered
    StartFailed(ModeId),
    /// Quit accepted; the session is going down
    ShuttingDown,
}

pub struct SessionCoordinator {
    mode: Mode,
    active: Option<ModeWorker>,
    generation: u64,
    entered_at: Option<Instant>,
    pool: Arc<ResourcePool>,
    events: broadcast::Sender<SessionEvent>,
    msg_tx: mpsc::Sender<SessionMsg>,
    shutdown: watch::Sender<bool>,
    join_timeout: Duration,
    static_poll: Duration,
}

impl SessionCoordinator {
    pub fn new(
        pool: Arc<ResourcePool>,
        events: broadcast::Sender<SessionEvent>,
        msg_tx: mpsc::Sender<SessionMsg>,
        shutdown: watch::Sender<bool>,
        join_timeout: Duration,
        static_poll: Duration,
    ) -> Self {
        Self {
            mode: Mode::Idle,
            active: None,
            generation: 0,
            entered_at: None,
            pool,
            events,
            msg_tx,
            shutdown,
            join_timeout,
            static_poll,
        }
    }

    /// Current mode (single source of truth).
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run the actor until a quit or shutdown request.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionMsg>) {
        info!("session coordinator started");
        while let Some(msg) = rx.recv().await {
            if !self.handle_msg(msg).await {
                break;
            }
        }
        info!("session coordinator stopped");
    }

    /// Process one message. Returns false when the actor should exit.
    async fn handle_msg(&mut self, msg: SessionMsg) -> bool {
        match msg {
            SessionMsg::Command(command) => {
                let outcome = self.handle_command(command).await;
                info!(%command, ?outcome, "command handled");
                outcome != Outcome::ShuttingDown
            }
            SessionMsg::WorkerExited {
                mode,
                generation,
                result,
            } => {
                self.handle_worker_exit(mode, generation, result);
                true
            }
            SessionMsg::Shutdown => {
                self.shut_down().await;
                false
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Outcome {
        match command {
            Command::ToggleRealtime => match self.mode {
                Mode::Realtime => self.stop_active().await,
                Mode::Idle => self.start(ModeId::Realtime).await,
                active => self.reject_busy(active),
            },
            Command::StartLongform => match self.mode {
                Mode::Idle => self.start(ModeId::Longform).await,
                active => self.reject_busy(active),
            },
            Command::StopLongform => match self.mode {
                Mode::Longform => self.stop_active().await,
                _ => {
                    info!("no active long-form recording to stop");
                    Outcome::NothingToStop
                }
            },
            Command::RunStatic => match self.mode {
                Mode::Idle => self.start(ModeId::Static).await,
                active => self.reject_busy(active),
            },
            Command::Quit => {
                self.shut_down().await;
                Outcome::ShuttingDown
            }
        }
    }

    /// Enter `mode`: acquire its engine, then spawn the worker. A failed
    /// acquisition leaves the session idle and retryable.
    async fn start(&mut self, mode: ModeId) -> Outcome {
        let engine = match self.pool.acquire(mode).await {
            Ok(engine) => engine,
            Err(e) => {
                warn!(%mode, err = %e, "cannot enter mode, engine unavailable");
                return Outcome::StartFailed(mode);
            }
        };

        self.generation += 1;
        let worker = ModeWorker::spawn(
            mode,
            self.generation,
            engine,
            self.msg_tx.clone(),
            self.static_poll,
        );
        self.active = Some(worker);
        self.mode = mode.into();
        self.entered_at = Some(Instant::now());
        info!(%mode, "mode started");
        let _ = self.events.send(SessionEvent::entered(mode));
        Outcome::Started(mode)
    }

    /// Stop the active worker and return to idle.
    async fn stop_active(&mut self) -> Outcome {
        let Some(mut worker) = self.active.take() else {
            warn!(mode = %self.mode, "mode set but no worker to stop");
            self.mode = Mode::Idle;
            return Outcome::NothingToStop;
        };

        let mode = worker.mode;
        worker.signal_stop();
        worker.join(self.join_timeout).await;
        self.finish(mode);
        Outcome::Stopped(mode)
    }

    fn reject_busy(&self, active: Mode) -> Outcome {
        info!(%active, "busy: finish the current operation first");
        Outcome::Busy { active }
    }

    /// Clear the mode and emit the exit event.
    fn finish(&mut self, mode: ModeId) {
        let duration_ms = self
            .entered_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.mode = Mode::Idle;
        info!(%mode, duration_ms, "mode stopped");
        let _ = self.events.send(SessionEvent::exited(mode, duration_ms));
    }

    /// A worker exited on its own: static completion, a realtime stream
    /// ending, or a failure inside the mode's work.
    fn handle_worker_exit(
        &mut self,
        mode: ModeId,
        generation: u64,
        result: Result<(), EngineError>,
    ) {
        if self.active.as_ref().map(|w| w.generation) != Some(generation) {
            debug!(%mode, generation, "stale worker exit, ignoring");
            return;
        }

        if let Err(e) = &result {
            warn!(%mode, err = %e, "worker failed; session stays usable");
        }

        // The worker task is already done; no join needed.
        self.active = None;
        self.finish(mode);
    }

    /// Ordered stop of the active mode ahead of process teardown.
    async fn shut_down(&mut self) {
        info!("session shutting down");
        if let Some(mut worker) = self.active.take() {
            let mode = worker.mode;
            match mode {
                // Bounded work: let it finish naturally.
                ModeId::Static => {
                    info!("leaving static transcription to finish");
                    worker.detach();
                }
                _ => {
                    worker.signal_stop();
                    worker.join(self.join_timeout).await;
                }
            }
            self.finish(mode);
        }
        let _ = self.shutdown.send(true);
    }
}
