//! Operator client for the control socket

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::net::UnixStream;
use tracing::debug;

use crate::config::default_socket_path;
use crate::coordinator::{ClientInfo, EndReport, GradeReport, LeaderboardSnapshot, StartReport, StatusReport};
use crate::server::{ControlRequest, ControlResponse, DEFAULT_MAX_LINE, read_response, write_frame};

/// Default timeout for control socket operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for sending operator commands to a running server
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for ControlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the control socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Start a round, optionally pinning the target
    pub async fn start(&self, target: Option<i32>) -> Result<StartReport> {
        debug!(?target, "ControlClient: starting round");
        match self.send_request(ControlRequest::Start { target }).await? {
            ControlResponse::Started { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn end(&self) -> Result<EndReport> {
        debug!("ControlClient: ending round");
        match self.send_request(ControlRequest::End).await? {
            ControlResponse::Ended { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn grade(&self, name: &str) -> Result<GradeReport> {
        debug!(%name, "ControlClient: grading");
        let request = ControlRequest::Grade { name: name.to_string() };
        match self.send_request(request).await? {
            ControlResponse::Graded { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn pending(&self) -> Result<Vec<String>> {
        match self.send_request(ControlRequest::Pending).await? {
            ControlResponse::Pending { names } => Ok(names),
            other => Err(unexpected(other)),
        }
    }

    pub async fn leaderboard(&self) -> Result<LeaderboardSnapshot> {
        match self.send_request(ControlRequest::Leaderboard).await? {
            ControlResponse::Leaderboard { standings } => Ok(standings),
            other => Err(unexpected(other)),
        }
    }

    pub async fn clients(&self) -> Result<Vec<ClientInfo>> {
        match self.send_request(ControlRequest::Clients).await? {
            ControlResponse::Clients { clients } => Ok(clients),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<StatusReport> {
        match self.send_request(ControlRequest::Status).await? {
            ControlResponse::Status { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Check the server is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("ControlClient: pinging server");
        match self.send_request(ControlRequest::Ping).await? {
            ControlResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request the server to shut down gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("ControlClient: requesting shutdown");
        match self.send_request(ControlRequest::Shutdown).await? {
            ControlResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Send one request and wait for its response
    async fn send_request(&self, request: ControlRequest) -> Result<ControlResponse> {
        debug!(?self.socket_path, ?request, "ControlClient: sending request");

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context(format!(
                "Failed to connect to {} (is `xd serve` running?)",
                self.socket_path.display()
            ))?;

        tokio::time::timeout(self.timeout, write_frame(&mut stream, &request))
            .await
            .context("Write timeout")??;

        let response = tokio::time::timeout(self.timeout, read_response(&mut stream, DEFAULT_MAX_LINE))
            .await
            .context("Read timeout")??;

        debug!(?response, "ControlClient: received response");
        Ok(response)
    }
}

fn unexpected(response: ControlResponse) -> eyre::Report {
    match response {
        ControlResponse::Error { message } => eyre::eyre!("{}", message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = ControlClient::default();
        assert!(client.socket_path().ends_with("control.sock"));
    }

    #[test]
    fn test_client_with_timeout() {
        let client = ControlClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let client = ControlClient::with_socket_path(temp.path().join("nonexistent.sock"));
        assert!(!client.socket_exists());
    }

    #[tokio::test]
    async fn test_ping_without_server_fails() {
        let temp = TempDir::new().unwrap();
        let client = ControlClient::with_socket_path(temp.path().join("nonexistent.sock"));
        let err = client.ping().await.unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }

    #[test]
    fn test_error_response_becomes_message() {
        let err = unexpected(ControlResponse::Error {
            message: "No active experiment to end".to_string(),
        });
        assert_eq!(err.to_string(), "No active experiment to end");
    }
}
