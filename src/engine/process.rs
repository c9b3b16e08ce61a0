//! Shared plumbing for launching and talking to engine processes

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{EngineError, ModeId};
use crate::events::SessionEvent;

/// Appended to every engine launch so the engine's native hotkey bindings
/// never conflict with the companion listener.
const NO_HOTKEYS_FLAG: &str = "--no-hotkeys";

/// One-shot invocation that forces full model initialization up front.
const WARMUP_FLAG: &str = "--warmup";

/// A configured engine command line.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: String,
    args: Vec<String>,
}

impl EngineCommand {
    /// Build from a whitespace-split command line: the first element is
    /// the program, the rest are its arguments.
    pub fn parse(parts: &[String]) -> Result<Self, EngineError> {
        let (program, args) = parts.split_first().ok_or(EngineError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Launch the engine process with hotkeys disabled.
    pub fn spawn(&self, stdin: Stdio, stdout: Stdio) -> Result<Child, EngineError> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(NO_HOTKEYS_FLAG)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    /// Launch with piped stdout and hand the transcript stream back
    /// alongside the child.
    pub fn spawn_streaming(&self, stdin: Stdio) -> Result<(Child, ChildStdout), EngineError> {
        let mut child = self.spawn(stdin, Stdio::piped())?;
        let stdout = child.stdout.take().expect("stdout was requested piped");
        Ok((child, stdout))
    }

    /// Run the engine once in warm-up mode and wait for it to finish.
    pub fn run_warmup(&self) -> Result<(), EngineError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(WARMUP_FLAG)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::WarmupFailed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Forward transcript lines from an engine's output stream to the session
/// event channel until EOF. Returns the number of segments forwarded.
pub fn pump_transcript(
    reader: impl Read,
    mode: ModeId,
    events: &broadcast::Sender<SessionEvent>,
) -> usize {
    let mut forwarded = 0;
    for line in BufReader::new(reader).lines() {
        match line {
            Ok(raw) => {
                let text = raw.trim();
                if text.is_empty() {
                    continue;
                }
                debug!(%mode, text, "transcript segment");
                let _ = events.send(SessionEvent::Transcript {
                    mode,
                    text: text.to_string(),
                });
                forwarded += 1;
            }
            Err(e) => {
                warn!(%mode, ?e, "error reading engine output");
                break;
            }
        }
    }
    forwarded
}
