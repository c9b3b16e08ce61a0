//! Command vocabulary for the loopback control channel
//!
//! Commands arrive as single UTF-8 text tags, one per connection, sent by
//! the companion hotkey process. The protocol is fire-and-forget: nothing
//! is ever written back to the sender.

use std::fmt;
use std::str::FromStr;

/// The closed set of commands the companion process can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle real-time transcription on or off
    ToggleRealtime,

    /// Begin a long-form recording
    StartLongform,

    /// End the long-form recording and transcribe the captured span
    StopLongform,

    /// Transcribe a pre-recorded file
    RunStatic,

    /// Shut the whole session down
    Quit,
}

/// An inbound tag that is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command tag {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOGGLE_REALTIME" => Ok(Command::ToggleRealtime),
            "START_LONGFORM" => Ok(Command::StartLongform),
            "STOP_LONGFORM" => Ok(Command::StopLongform),
            "RUN_STATIC" => Ok(Command::RunStatic),
            "QUIT" => Ok(Command::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Command::ToggleRealtime => "TOGGLE_REALTIME",
            Command::StartLongform => "START_LONGFORM",
            Command::StopLongform => "STOP_LONGFORM",
            Command::RunStatic => "RUN_STATIC",
            Command::Quit => "QUIT",
        };
        f.write_str(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("TOGGLE_REALTIME".parse(), Ok(Command::ToggleRealtime));
        assert_eq!("START_LONGFORM".parse(), Ok(Command::StartLongform));
        assert_eq!("STOP_LONGFORM".parse(), Ok(Command::StopLongform));
        assert_eq!("RUN_STATIC".parse(), Ok(Command::RunStatic));
        assert_eq!("QUIT".parse(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_unknown_tag() {
        let err = "PAUSE_EVERYTHING".parse::<Command>().unwrap_err();
        assert_eq!(err, UnknownCommand("PAUSE_EVERYTHING".to_string()));
    }

    #[test]
    fn test_display_matches_wire_tags() {
        assert_eq!(Command::ToggleRealtime.to_string(), "TOGGLE_REALTIME");
        assert_eq!(Command::Quit.to_string(), "QUIT");
    }
}
