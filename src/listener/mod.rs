//! TCP command listener
//!
//! One command per connection: accept, read once, trim, parse, forward to
//! the coordinator. The protocol is one-way; unrecognized tags are logged
//! and dropped, and the sender is never answered.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::session::SessionMsg;

/// Inbound commands are one short tag; anything longer is garbage.
const READ_BUFFER_SIZE: usize = 1024;

/// A connection that never sends a payload gets this long before we move on.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

pub struct CommandListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CommandListener {
    /// Bind the loopback control address.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind command listener on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("command listener has no local address")?;
        info!(%local_addr, "command listener ready");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept loop: one command per connection, until the shutdown flag
    /// flips. Connections are handled inline so commands reach the
    /// coordinator in arrival order.
    pub async fn run(self, msg_tx: mpsc::Sender<SessionMsg>, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "connection accepted");
                            if let Some(command) = read_command(stream).await {
                                if msg_tx.send(SessionMsg::Command(command)).await.is_err() {
                                    warn!("coordinator queue closed, listener exiting");
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!(?e, "accept failed"),
                    }
                }
            }
        }
        info!("command listener stopped");
    }
}

/// Read one command from the connection. Garbage, timeouts, and read
/// errors all yield None; the protocol never answers either way.
async fn read_command(mut stream: TcpStream) -> Option<Command> {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let n = match tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(?e, "read failed");
            return None;
        }
        Err(_) => {
            warn!("sender supplied no data, dropping connection");
            return None;
        }
    };

    let text = String::from_utf8_lossy(&buf[..n]);
    match text.trim().parse::<Command>() {
        Ok(command) => {
            info!(%command, "received command");
            Some(command)
        }
        Err(e) => {
            warn!(%e, "dropping unrecognized command");
            None
        }
    }
}
