//! Companion process supervision
//!
//! The hotkey-listening companion is a separate OS process the daemon
//! launches but does not otherwise own. The supervisor holds the spawned
//! child handle directly, so termination never depends on rediscovering
//! the process by enumeration; leftovers from a previous session are still
//! killed by command-line match before launch.

use std::time::Instant;

use tokio::process::{Child, Command};
use tracing::{info, warn};

pub struct ProcessSupervisor {
    command: Vec<String>,
    marker: String,
    child: Option<Child>,
    launched_at: Option<Instant>,
}

impl ProcessSupervisor {
    /// `command` launches the companion; `marker` is the command-line
    /// substring that identifies stale companions from earlier sessions
    /// (process name alone is not unique enough).
    pub fn new(command: Vec<String>, marker: String) -> Self {
        Self {
            command,
            marker,
            child: None,
            launched_at: None,
        }
    }

    /// Launch the companion. Failure is logged and leaves the identity
    /// unknown; the session keeps running without hotkey support.
    pub async fn launch(&mut self) {
        self.kill_stale().await;

        let Some((program, args)) = self.command.split_first() else {
            warn!("companion command is empty, skipping launch");
            return;
        };

        let mut command = Command::new(program);
        command.args(args);
        // Own process group: terminal signals aimed at the daemon must not
        // reach the companion.
        #[cfg(unix)]
        command.process_group(0);

        match command.spawn() {
            Ok(child) => {
                info!(pid = child.id(), program, "companion launched");
                self.child = Some(child);
                self.launched_at = Some(Instant::now());
            }
            Err(e) => {
                warn!(program, ?e, "failed to launch companion; terminate will be a no-op");
            }
        }
    }

    /// Best-effort kill of companions left over from a previous session.
    async fn kill_stale(&self) {
        if self.marker.is_empty() {
            return;
        }
        match Command::new("pkill").arg("-f").arg(&self.marker).status().await {
            Ok(status) if status.success() => {
                info!(marker = %self.marker, "killed stale companion process");
            }
            Ok(_) => {} // no match
            Err(e) => warn!(?e, "pkill unavailable, skipping stale cleanup"),
        }
    }

    /// Companion pid, when its identity is known.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Terminate the companion we launched; a no-op when identity is
    /// unknown.
    pub async fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            info!("no companion to terminate");
            return;
        };

        let pid = child.id();
        let uptime_secs = self.launched_at.take().map(|t| t.elapsed().as_secs());
        match child.kill().await {
            Ok(()) => info!(pid, uptime_secs, "companion terminated"),
            Err(e) => warn!(pid, ?e, "failed to kill companion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_without_launch_is_noop() {
        let mut supervisor = ProcessSupervisor::new(vec!["true".to_string()], String::new());
        assert!(supervisor.pid().is_none());
        supervisor.terminate().await;
        assert!(supervisor.pid().is_none());
    }

    #[tokio::test]
    async fn test_launch_and_terminate() {
        let mut supervisor = ProcessSupervisor::new(
            vec!["sleep".to_string(), "30".to_string()],
            String::new(),
        );
        supervisor.launch().await;
        assert!(supervisor.pid().is_some());

        supervisor.terminate().await;
        assert!(supervisor.pid().is_none());
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_identity_unknown() {
        let mut supervisor = ProcessSupervisor::new(
            vec!["definitely-not-a-real-companion".to_string()],
            String::new(),
        );
        supervisor.launch().await;
        assert!(supervisor.pid().is_none());
        supervisor.terminate().await;
    }
}
