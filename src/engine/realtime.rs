//! Real-time engine adapter
//!
//! The real-time stream has no natural completion: `start` blocks,
//! forwarding transcript segments as the engine produces them, until
//! `stop` ends the stream from another unit.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::process::{pump_transcript, EngineCommand};
use super::{Engine, EngineError, ModeId};
use crate::events::SessionEvent;

pub struct RealtimeEngine {
    command: EngineCommand,
    events: broadcast::Sender<SessionEvent>,
    running: AtomicBool,
    child: Mutex<Option<std::process::Child>>,
}

impl RealtimeEngine {
    pub fn new(command: EngineCommand, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            command,
            events,
            running: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    fn reap(&self) {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Engine for RealtimeEngine {
    fn mode(&self) -> ModeId {
        ModeId::Realtime
    }

    /// Launch the engine process and stream its transcript until stopped.
    fn start(&self) -> Result<(), EngineError> {
        self.running.store(true, Ordering::SeqCst);

        let (child, stdout) = match self.command.spawn_streaming(Stdio::null()) {
            Ok(pair) => pair,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let pid = child.id();
        info!(pid, "realtime engine started");
        *self.child.lock().unwrap() = Some(child);

        // A stop that raced the launch has no child to kill yet; honor it
        // here instead of streaming forever.
        if !self.running.load(Ordering::SeqCst) {
            self.reap();
            return Ok(());
        }

        // Blocks until stop() closes the process and the stream hits EOF.
        let segments = pump_transcript(stdout, ModeId::Realtime, &self.events);

        self.running.store(false, Ordering::SeqCst);
        self.reap();
        info!(pid, segments, "realtime engine stopped");
        Ok(())
    }

    /// End the stream. Idempotent; safe to call from any unit.
    fn stop(&self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(child) = self.child.lock().unwrap().as_mut() {
            if let Err(e) = child.kill() {
                warn!(?e, "failed to kill realtime engine");
            }
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn clean_up(&self) -> Result<(), EngineError> {
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shell(script: &str) -> EngineCommand {
        EngineCommand::parse(&[
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_streams_until_stopped() {
        let (events, mut rx) = broadcast::channel(16);
        let engine = Arc::new(RealtimeEngine::new(
            shell("echo hello; exec sleep 30"),
            events,
        ));

        let runner = Arc::clone(&engine);
        let handle = std::thread::spawn(move || runner.start());

        // The first segment arrives while the stream is still open.
        match rx.blocking_recv().unwrap() {
            SessionEvent::Transcript { mode, text } => {
                assert_eq!(mode, ModeId::Realtime);
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(engine.is_busy());

        engine.stop().unwrap();
        handle.join().unwrap().unwrap();
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_stop_before_start_is_idempotent() {
        let (events, _rx) = broadcast::channel(16);
        let engine = RealtimeEngine::new(shell("true"), events);
        assert!(engine.stop().is_ok());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_start_failure_surfaces_spawn_error() {
        let (events, _rx) = broadcast::channel(16);
        let command = EngineCommand::parse(&["definitely-not-a-real-engine".to_string()]).unwrap();
        let engine = RealtimeEngine::new(command, events);
        assert!(matches!(engine.start(), Err(EngineError::Spawn { .. })));
    }
}
