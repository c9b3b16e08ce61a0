//! Session events broadcast to observers
//!
//! Events fan out over a broadcast channel: the main loop renders them as
//! console log lines, and they serialize cleanly should a future surface
//! want them.

use serde::{Deserialize, Serialize};

use crate::engine::ModeId;

/// Events emitted by the coordinator and the engines during a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Real-time streaming began
    RealtimeStarted,

    /// Real-time streaming ended
    RealtimeStopped {
        /// Duration in milliseconds the stream was active
        duration_ms: u64,
    },

    /// Long-form recording began
    LongformStarted,

    /// Long-form recording ended and its transcript was produced
    LongformComplete {
        /// Duration in milliseconds from start of recording
        duration_ms: u64,
    },

    /// Static file transcription began
    StaticStarted,

    /// Static file transcription finished
    StaticComplete {
        /// Duration in milliseconds the transcription ran
        duration_ms: u64,
    },

    /// A transcript segment produced by an active engine
    Transcript { mode: ModeId, text: String },
}

impl SessionEvent {
    /// Event marking entry into `mode`.
    pub fn entered(mode: ModeId) -> Self {
        match mode {
            ModeId::Realtime => SessionEvent::RealtimeStarted,
            ModeId::Longform => SessionEvent::LongformStarted,
            ModeId::Static => SessionEvent::StaticStarted,
        }
    }

    /// Event marking exit from `mode` after `duration_ms`.
    pub fn exited(mode: ModeId, duration_ms: u64) -> Self {
        match mode {
            ModeId::Realtime => SessionEvent::RealtimeStopped { duration_ms },
            ModeId::Longform => SessionEvent::LongformComplete { duration_ms },
            ModeId::Static => SessionEvent::StaticComplete { duration_ms },
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::RealtimeStarted => write!(f, "REALTIME_STARTED"),
            SessionEvent::RealtimeStopped { duration_ms } => {
                write!(f, "REALTIME_STOPPED ({}ms)", duration_ms)
            }
            SessionEvent::LongformStarted => write!(f, "LONGFORM_STARTED"),
            SessionEvent::LongformComplete { duration_ms } => {
                write!(f, "LONGFORM_COMPLETE ({}ms)", duration_ms)
            }
            SessionEvent::StaticStarted => write!(f, "STATIC_STARTED"),
            SessionEvent::StaticComplete { duration_ms } => {
                write!(f, "STATIC_COMPLETE ({}ms)", duration_ms)
            }
            SessionEvent::Transcript { mode, text } => write!(f, "[{}] {}", mode, text),
        }
    }
}
