//! Long-form engine adapter
//!
//! Recording runs in the engine process until the daemon closes the
//! process's stdin; the engine then transcribes the captured span, writes
//! the transcript to stdout, and exits. Construction includes a full
//! warm-up so the first recording starts without a model-load stall.

use std::process::Stdio;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::process::{pump_transcript, EngineCommand};
use super::{Engine, EngineError, ModeId};
use crate::events::SessionEvent;

pub struct LongformEngine {
    command: EngineCommand,
    events: broadcast::Sender<SessionEvent>,
    child: Mutex<Option<std::process::Child>>,
}

impl LongformEngine {
    pub fn new(command: EngineCommand, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            command,
            events,
            child: Mutex::new(None),
        }
    }

    /// Force full engine initialization (model load) ahead of first use.
    pub fn force_initialize(&self) -> Result<(), EngineError> {
        info!(program = self.command.program(), "warming up longform engine");
        self.command.run_warmup()
    }
}

impl Engine for LongformEngine {
    fn mode(&self) -> ModeId {
        ModeId::Longform
    }

    /// Begin recording.
    fn start(&self) -> Result<(), EngineError> {
        let mut guard = self.child.lock().unwrap();
        if guard.is_some() {
            warn!("longform recording already in progress");
            return Ok(());
        }
        let child = self.command.spawn(Stdio::piped(), Stdio::piped())?;
        info!(pid = child.id(), "longform recording started");
        *guard = Some(child);
        Ok(())
    }

    /// End the recording and transcribe the captured span.
    fn stop(&self) -> Result<(), EngineError> {
        let mut child = match self.child.lock().unwrap().take() {
            Some(child) => child,
            None => return Err(EngineError::NotRunning),
        };

        // Closing stdin ends the recording; the engine answers with the
        // transcript on stdout and exits.
        drop(child.stdin.take());
        if let Some(stdout) = child.stdout.take() {
            let segments = pump_transcript(stdout, ModeId::Longform, &self.events);
            info!(segments, "longform transcription complete");
        }

        let status = child.wait()?;
        if !status.success() {
            warn!(%status, "longform engine exited abnormally");
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.child.lock().unwrap().is_some()
    }

    /// A recording abandoned at shutdown is discarded, not transcribed.
    fn clean_up(&self) -> Result<(), EngineError> {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            warn!(pid = child.id(), "discarding unfinished longform recording");
            child.kill()?;
            child.wait()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> EngineCommand {
        EngineCommand::parse(&[
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_stop_transcribes_captured_span() {
        let (events, mut rx) = broadcast::channel(16);
        let engine = LongformEngine::new(shell("cat >/dev/null; echo captured"), events);

        engine.start().unwrap();
        assert!(engine.is_busy());

        engine.stop().unwrap();
        assert!(!engine.is_busy());

        match rx.try_recv().unwrap() {
            SessionEvent::Transcript { mode, text } => {
                assert_eq!(mode, ModeId::Longform);
                assert_eq!(text, "captured");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_stop_without_recording_errors() {
        let (events, _rx) = broadcast::channel(16);
        let engine = LongformEngine::new(shell("true"), events);
        assert!(matches!(engine.stop(), Err(EngineError::NotRunning)));
    }

    #[test]
    fn test_clean_up_discards_recording() {
        let (events, _rx) = broadcast::channel(16);
        let engine = LongformEngine::new(shell("cat >/dev/null"), events);

        engine.start().unwrap();
        engine.clean_up().unwrap();
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_force_initialize_runs_warmup() {
        let (events, _rx) = broadcast::channel(16);
        let engine = LongformEngine::new(shell("exit 0"), events);
        assert!(engine.force_initialize().is_ok());
    }
}
