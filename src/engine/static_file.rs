//! Static-file engine adapter
//!
//! The engine process drives file selection and transcription itself and
//! exits when done; the daemon only watches for completion. Work here is
//! bounded, so the engine is always left to finish on its own.

use std::process::Stdio;
use std::sync::Mutex;
use std::thread;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::process::{pump_transcript, EngineCommand};
use super::{Engine, EngineError, ModeId};
use crate::events::SessionEvent;

pub struct StaticEngine {
    command: EngineCommand,
    events: broadcast::Sender<SessionEvent>,
    child: Mutex<Option<std::process::Child>>,
}

impl StaticEngine {
    pub fn new(command: EngineCommand, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            command,
            events,
            child: Mutex::new(None),
        }
    }
}

impl Engine for StaticEngine {
    fn mode(&self) -> ModeId {
        ModeId::Static
    }

    /// Kick off file selection and transcription.
    fn start(&self) -> Result<(), EngineError> {
        let (child, stdout) = self.command.spawn_streaming(Stdio::null())?;
        info!(pid = child.id(), "static transcription started");

        // Drain transcript lines on a dedicated thread so the engine never
        // stalls on a full pipe while we poll for completion.
        let events = self.events.clone();
        thread::Builder::new()
            .name("static-transcript".to_string())
            .spawn(move || {
                pump_transcript(stdout, ModeId::Static, &events);
            })?;

        *self.child.lock().unwrap() = Some(child);
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        // Bounded work; completion is observed via is_busy, never forced.
        Ok(())
    }

    /// Still transcribing? Completion is the engine process exiting.
    fn is_busy(&self) -> bool {
        let mut guard = self.child.lock().unwrap();
        match guard.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "static engine exited");
                    *guard = None;
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    warn!(?e, "failed to poll static engine");
                    *guard = None;
                    false
                }
            },
            None => false,
        }
    }

    /// Drop the handle without killing: an in-flight transcription is
    /// allowed to finish naturally.
    fn clean_up(&self) -> Result<(), EngineError> {
        if let Some(child) = self.child.lock().unwrap().take() {
            info!(pid = child.id(), "leaving static transcription to finish");
        }
        Ok(())
    }
}
