//! Configuration loading and management
//!
//! Defaults plus environment-variable overrides; no configuration file.
//! Command lines are given whitespace-split, e.g.
//! `STT_REALTIME_CMD="stt-engine realtime --lang el"`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Loopback address the command listener binds by default.
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:35000";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the TCP command channel
    pub listen_addr: SocketAddr,

    /// Command line that launches the hotkey companion
    pub companion_cmd: Vec<String>,

    /// Command-line substring identifying stale companions
    pub companion_marker: String,

    /// Engine command lines, one per mode
    pub realtime_cmd: Vec<String>,
    pub longform_cmd: Vec<String>,
    pub static_cmd: Vec<String>,

    /// Bound on worker and unit joins during stop and teardown
    pub join_timeout: Duration,

    /// Interval at which static-mode completion is polled
    pub static_poll: Duration,
}

impl Config {
    /// Load configuration from environment and defaults.
    pub fn load() -> Result<Self> {
        let listen_addr = env_or("STT_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)
            .parse()
            .context("invalid STT_LISTEN_ADDR")?;

        Ok(Self {
            listen_addr,
            companion_cmd: split_cmd(&env_or("STT_COMPANION_CMD", "stt-hotkeys")),
            companion_marker: env_or("STT_COMPANION_MARKER", "stt-hotkeys"),
            realtime_cmd: split_cmd(&env_or("STT_REALTIME_CMD", "stt-engine realtime")),
            longform_cmd: split_cmd(&env_or("STT_LONGFORM_CMD", "stt-engine longform")),
            static_cmd: split_cmd(&env_or("STT_STATIC_CMD", "stt-engine static")),
            join_timeout: Duration::from_millis(env_ms("STT_JOIN_TIMEOUT_MS", 2000)?),
            static_poll: Duration::from_millis(env_ms("STT_STATIC_POLL_MS", 500)?),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_ms(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn split_cmd(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.listen_addr.port(), 35000);
        assert!(config.listen_addr.ip().is_loopback());
        assert_eq!(config.join_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_split_cmd_handles_extra_whitespace() {
        let parts = split_cmd("  stt-engine   longform --lang el ");
        assert_eq!(parts, vec!["stt-engine", "longform", "--lang", "el"]);
    }
}
