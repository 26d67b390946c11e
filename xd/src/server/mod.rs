//! Network front ends for the coordinator
//!
//! Players connect over TCP and speak line-delimited JSON. The operator
//! drives rounds through a Unix socket next to it.

mod control;
mod player;
mod protocol;

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::coordinator::Coordinator;

pub use control::{cleanup_socket, create_listener_at, dispatch};
pub(crate) use control::read_response;
pub use player::handle_connection;
pub use protocol::{
    ControlRequest, ControlResponse, DEFAULT_MAX_LINE, FrameError, PlayerMessage, ServerMessage, read_frame,
    write_frame,
};

/// Bound listeners plus the coordinator they feed
pub struct Server {
    player_listener: TcpListener,
    control_listener: UnixListener,
    socket_path: PathBuf,
    coordinator: Coordinator,
    max_line: usize,
}

impl Server {
    /// Bind the player address and the control socket
    pub async fn bind(config: &Config) -> Result<Self> {
        config.validate()?;
        let player_listener = TcpListener::bind(&config.server.listen)
            .await
            .context(format!("Failed to bind {}", config.server.listen))?;
        let (control_listener, socket_path) = create_listener_at(&config.server.control_socket)?;

        Ok(Self {
            player_listener,
            control_listener,
            socket_path,
            coordinator: Coordinator::new(config.coordinator.clone()),
            max_line: config.server.max_line_bytes,
        })
    }

    pub fn player_addr(&self) -> Result<SocketAddr> {
        self.player_listener
            .local_addr()
            .context("Failed to read player listener address")
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve until `shutdown` resolves or an operator requests shutdown
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let handle = self.coordinator.handle();
        let coordinator_task = tokio::spawn(self.coordinator.run());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let player_task = tokio::spawn(player::serve(
            self.player_listener,
            handle.clone(),
            self.max_line,
            shutdown_tx.subscribe(),
        ));
        let control_task = tokio::spawn(control::serve(
            self.control_listener,
            handle.clone(),
            self.max_line,
            shutdown_tx.clone(),
        ));

        tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
            }
            _ = shutdown_rx.wait_for(|stop| *stop) => {}
        }
        shutdown_tx.send_replace(true);

        for (label, task) in [("player", player_task), ("control", control_task)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = label, error = %e, "Listener failed"),
                Err(e) => warn!(listener = label, error = %e, "Listener task panicked"),
            }
        }

        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Coordinator already stopped");
        }
        if let Err(e) = coordinator_task.await {
            warn!(error = %e, "Coordinator task panicked");
        }

        cleanup_socket(&self.socket_path);
        info!("Server stopped");
        Ok(())
    }
}
