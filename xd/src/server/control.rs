//! Operator control socket
//!
//! Unix Domain Socket carrying one request line and one response line per
//! connection. Operator calls go straight into the coordinator.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::io::{AsyncRead, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::protocol::{ControlRequest, ControlResponse, read_frame, write_frame};
use crate::coordinator::{CoordResult, CoordinatorHandle};

/// Create and bind the control socket
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating control socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind control socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept operator connections until shutdown is signalled
///
/// A `Shutdown` request flips `shutdown_tx` after its acknowledgment is sent.
pub async fn serve(
    listener: UnixListener,
    coordinator: CoordinatorHandle,
    max_line: usize,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let mut shutdown = shutdown_tx.subscribe();
    info!("Accepting operator requests");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: operator connection accepted");
                        let coordinator = coordinator.clone();
                        let shutdown_tx = shutdown_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, coordinator, max_line, shutdown_tx).await {
                                warn!(error = %e, "Operator connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: operator accept error");
                    }
                }
            }

            _ = shutdown.wait_for(|stop| *stop) => {
                debug!("serve: shutdown signalled");
                break;
            }
        }
    }

    info!("Stopped accepting operator requests");
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    coordinator: CoordinatorHandle,
    max_line: usize,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_frame::<_, ControlRequest>(&mut reader, max_line).await {
        Ok(Some(request)) => request,
        Ok(None) => return Err(eyre::eyre!("Empty message received")),
        Err(e) => {
            let response = ControlResponse::Error { message: e.to_string() };
            return write_frame(&mut write_half, &response).await;
        }
    };

    debug!(?request, "handle_connection: parsed request");
    let shutting_down = request == ControlRequest::Shutdown;
    let response = dispatch(&coordinator, request).await;
    write_frame(&mut write_half, &response).await?;

    if shutting_down {
        info!("Shutdown requested by operator");
        shutdown_tx.send_replace(true);
    }
    Ok(())
}

/// Apply one operator request to the coordinator
pub async fn dispatch(coordinator: &CoordinatorHandle, request: ControlRequest) -> ControlResponse {
    let result: CoordResult<ControlResponse> = match request {
        ControlRequest::Start { target } => coordinator
            .start_session(target)
            .await
            .map(|report| ControlResponse::Started { report }),
        ControlRequest::End => coordinator
            .end_session()
            .await
            .map(|report| ControlResponse::Ended { report }),
        ControlRequest::Grade { name } => coordinator
            .grade_pending(&name)
            .await
            .map(|report| ControlResponse::Graded { report }),
        ControlRequest::Pending => coordinator
            .list_pending()
            .await
            .map(|names| ControlResponse::Pending { names }),
        ControlRequest::Leaderboard => coordinator
            .leaderboard()
            .await
            .map(|standings| ControlResponse::Leaderboard { standings }),
        ControlRequest::Clients => coordinator
            .list_clients()
            .await
            .map(|clients| ControlResponse::Clients { clients }),
        ControlRequest::Status => coordinator
            .status()
            .await
            .map(|report| ControlResponse::Status { report }),
        ControlRequest::Ping => Ok(ControlResponse::Pong {
            version: crate::VERSION.to_string(),
        }),
        ControlRequest::Shutdown => Ok(ControlResponse::Ok),
    };

    result.unwrap_or_else(|e| {
        debug!(error = %e, "dispatch: request failed");
        ControlResponse::Error { message: e.to_string() }
    })
}

/// Read the single response line of an operator exchange
pub(crate) async fn read_response<R>(reader: R, max_line: usize) -> Result<ControlResponse>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    read_frame(&mut reader, max_line)
        .await
        .context("Failed to read response")?
        .ok_or_else(|| eyre::eyre!("Connection closed before response"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig, Phase, Verdict};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("control.sock");

        let (_, path) = create_listener_at(&socket_path).unwrap();
        assert_eq!(path, socket_path);
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("control.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        assert!(create_listener_at(&socket_path).is_ok());
    }

    #[test]
    fn test_cleanup_socket_handles_missing_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("nonexistent.sock");
        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_dispatch_round_trip() {
        let coord = Coordinator::new(CoordinatorConfig::default());
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        let session = handle.join("A").await.unwrap();

        let response = dispatch(&handle, ControlRequest::Grade { name: "A".to_string() }).await;
        assert_eq!(
            response,
            ControlResponse::Error {
                message: "Experiment is not running".to_string()
            }
        );

        let response = dispatch(&handle, ControlRequest::Start { target: Some(42) }).await;
        assert!(matches!(response, ControlResponse::Started { ref report } if report.round == 1));

        session.guess(42).await.unwrap();
        let response = dispatch(&handle, ControlRequest::Pending).await;
        assert_eq!(response, ControlResponse::Pending { names: vec!["A".to_string()] });

        match dispatch(&handle, ControlRequest::Grade { name: "A".to_string() }).await {
            ControlResponse::Graded { report } => assert_eq!(report.verdict, Verdict::Correct),
            other => panic!("Wrong response: {:?}", other),
        }

        match dispatch(&handle, ControlRequest::End).await {
            ControlResponse::Ended { report } => {
                assert_eq!(report.leaderboard.get("A"), Some(1));
            }
            other => panic!("Wrong response: {:?}", other),
        }

        match dispatch(&handle, ControlRequest::Status).await {
            ControlResponse::Status { report } => assert_eq!(report.phase, Phase::Ended),
            other => panic!("Wrong response: {:?}", other),
        }

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_socket_shutdown_request() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("control.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let coord = Coordinator::new(CoordinatorConfig::default());
        let handle = coord.handle();
        let coord_task = tokio::spawn(coord.run());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, handle.clone(), 4096, shutdown_tx));

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        write_frame(&mut stream, &ControlRequest::Shutdown).await.unwrap();
        let response = read_response(&mut stream, 4096).await.unwrap();
        assert_eq!(response, ControlResponse::Ok);

        shutdown_rx.wait_for(|stop| *stop).await.unwrap();
        server.await.unwrap().unwrap();

        handle.shutdown().await.unwrap();
        coord_task.await.unwrap();
    }
}
