//! stt-daemon: session coordinator for a hotkey-driven speech-to-text system
//!
//! The daemon:
//! - listens for companion commands on a loopback TCP socket
//! - arbitrates the three mutually-exclusive transcription modes
//! - lazily constructs and pools the engine processes behind each mode
//! - supervises the companion hotkey process
//! - tears everything down in order on QUIT or signal

mod command;
mod config;
mod engine;
mod events;
mod lifecycle;
mod listener;
mod pool;
mod session;
mod supervisor;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::{ModeId, ProcessEngineFactory};
use crate::events::SessionEvent;
use crate::lifecycle::{ShutdownCoordinator, ShutdownSignal};
use crate::listener::CommandListener;
use crate::pool::ResourcePool;
use crate::session::{SessionCoordinator, SessionMsg};
use crate::supervisor::ProcessSupervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "stt-daemon starting"
    );

    let config = Config::load()?;
    info!(addr = %config.listen_addr, "configuration loaded");

    // Channels for inter-component communication:
    // engines/coordinator -> observers
    let (event_tx, mut event_rx) = broadcast::channel::<SessionEvent>(64);
    // listener/workers -> coordinator (the single decision point)
    let (msg_tx, msg_rx) = mpsc::channel::<SessionMsg>(32);
    // global running flag, flipped once at shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let factory = ProcessEngineFactory::new(&config, event_tx.clone())?;
    let pool = Arc::new(ResourcePool::new(Arc::new(factory)));

    let coordinator = SessionCoordinator::new(
        Arc::clone(&pool),
        event_tx.clone(),
        msg_tx.clone(),
        shutdown_tx.clone(),
        config.join_timeout,
        config.static_poll,
    );
    let coordinator_handle = tokio::spawn(coordinator.run(msg_rx));

    let listener = CommandListener::bind(config.listen_addr).await?;
    let listen_addr = listener.local_addr();
    let listener_handle = tokio::spawn(listener.run(msg_tx.clone(), shutdown_rx.clone()));

    let mut supervisor = ProcessSupervisor::new(
        config.companion_cmd.clone(),
        config.companion_marker.clone(),
    );
    supervisor.launch().await;
    if supervisor.pid().is_none() {
        warn!("companion not running; commands can still arrive over the socket");
    }

    // The long-form model is the slow one; load it now instead of on the
    // first command.
    match pool.acquire(ModeId::Longform).await {
        Ok(_) => info!("long-form engine pre-loaded"),
        Err(e) => warn!(err = %e, "long-form pre-load failed, will retry on first use"),
    }

    info!(
        addr = %listen_addr,
        commands = "TOGGLE_REALTIME START_LONGFORM STOP_LONGFORM RUN_STATIC QUIT",
        "session ready"
    );

    let signals = ShutdownSignal::new();
    let mut quit_rx = shutdown_rx.clone();

    // Main loop: runs until a quit command or an OS signal.
    tokio::select! {
        _ = signals.wait() => {
            info!("shutdown signal received");
        }
        _ = wait_for_quit(&mut quit_rx) => {
            info!("quit command received");
        }
        _ = render_events(&mut event_rx) => {
            error!("session event channel closed unexpectedly");
        }
    }

    ShutdownCoordinator {
        shutdown: shutdown_tx,
        msg_tx,
        coordinator: coordinator_handle,
        listener: listener_handle,
        supervisor,
        pool,
        join_timeout: config.join_timeout,
    }
    .run()
    .await;

    info!("stt-daemon stopped");
    Ok(())
}

/// Resolve when the quit flag flips (or its sender disappears).
async fn wait_for_quit(rx: &mut watch::Receiver<bool>) {
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
}

/// Surface session events as log lines: mode lifecycle and transcript
/// segments are the daemon's only console output.
async fn render_events(rx: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => info!(%event, "session event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
