//! Engine boundary: the recognition collaborators backing each mode
//!
//! Engines are opaque external processes reached through a narrow
//! capability surface. The daemon never looks inside them: it launches
//! them with their own hotkey bindings disabled, streams their transcript
//! lines, and stops them.

mod longform;
mod process;
mod realtime;
mod static_file;

pub use longform::LongformEngine;
pub use realtime::RealtimeEngine;
pub use static_file::StaticEngine;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::events::SessionEvent;
use process::EngineCommand;

/// Identity of the three transcription modes; the pool key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeId {
    Realtime,
    Longform,
    Static,
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeId::Realtime => write!(f, "realtime"),
            ModeId::Longform => write!(f, "longform"),
            ModeId::Static => write!(f, "static"),
        }
    }
}

/// Capability surface common to every engine.
///
/// `start` blocks for as long as the mode's work model requires: realtime
/// streams until stopped, longform returns once recording has begun, and
/// static returns once transcription has begun. Callers run it on a
/// blocking task.
pub trait Engine: Send + Sync {
    /// The mode this engine backs.
    fn mode(&self) -> ModeId;

    /// Begin the mode's work.
    fn start(&self) -> Result<(), EngineError>;

    /// Cooperatively stop. Realtime ends its streaming loop; longform ends
    /// the recording and transcribes the captured span.
    fn stop(&self) -> Result<(), EngineError>;

    /// Whether the engine is still producing output.
    fn is_busy(&self) -> bool;

    /// Release underlying resources. Called once at process shutdown.
    fn clean_up(&self) -> Result<(), EngineError>;
}

/// Errors crossing the engine boundary
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine command line is empty")]
    EmptyCommand,

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("warm-up run of `{program}` exited with {status}")]
    WarmupFailed {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("engine is not running")]
    NotRunning,

    #[error("engine task failed: {0}")]
    Task(String),

    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the engine behind a mode on first acquisition.
pub trait EngineFactory: Send + Sync {
    fn build(&self, mode: ModeId) -> Result<Arc<dyn Engine>, EngineError>;
}

/// Compile-time registry mapping each mode to its engine constructor.
pub struct ProcessEngineFactory {
    realtime: EngineCommand,
    longform: EngineCommand,
    static_file: EngineCommand,
    events: broadcast::Sender<SessionEvent>,
}

impl ProcessEngineFactory {
    /// Parse the configured engine command lines. Fails early, at startup,
    /// if any of them is empty.
    pub fn new(
        config: &Config,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            realtime: EngineCommand::parse(&config.realtime_cmd)?,
            longform: EngineCommand::parse(&config.longform_cmd)?,
            static_file: EngineCommand::parse(&config.static_cmd)?,
            events,
        })
    }
}

impl EngineFactory for ProcessEngineFactory {
    fn build(&self, mode: ModeId) -> Result<Arc<dyn Engine>, EngineError> {
        match mode {
            ModeId::Realtime => Ok(Arc::new(RealtimeEngine::new(
                self.realtime.clone(),
                self.events.clone(),
            ))),
            ModeId::Longform => {
                let engine = LongformEngine::new(self.longform.clone(), self.events.clone());
                // The long-form model is the expensive one; construction
                // includes a full warm-up so first use is instant.
                engine.force_initialize()?;
                Ok(Arc::new(engine))
            }
            ModeId::Static => Ok(Arc::new(StaticEngine::new(
                self.static_file.clone(),
                self.events.clone(),
            ))),
        }
    }
}
