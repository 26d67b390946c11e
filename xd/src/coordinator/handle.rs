//! CoordinatorHandle - async interface to the Coordinator task

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::error::{CoordResult, CoordinatorError};
use super::leaderboard::LeaderboardSnapshot;
use super::messages::{CoordRequest, EndReport, GradeReport, Notice, StartReport, StatusReport};
use super::registry::ClientInfo;

/// Handle for connection handlers and operators to reach the Coordinator
///
/// Cloneable; every call is a request/reply round-trip through the
/// Coordinator's mailbox.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
    client_buffer: usize,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, client_buffer: usize) -> Self {
        debug!(client_buffer, "CoordinatorHandle::new: called");
        Self { tx, client_buffer }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> CoordRequest) -> CoordResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Register `name` with an outbound queue owned by the caller
    pub async fn register(&self, name: &str, outbound: &mpsc::Sender<Notice>) -> CoordResult<()> {
        debug!(%name, "CoordinatorHandle::register: called");
        self.request(|reply_tx| CoordRequest::Register {
            name: name.to_string(),
            outbound: outbound.downgrade(),
            reply_tx,
        })
        .await?
    }

    /// Create a bounded outbound queue and register `name` against it
    pub async fn join(&self, name: &str) -> CoordResult<ClientSession> {
        debug!(%name, "CoordinatorHandle::join: called");
        let (outbound, inbox) = mpsc::channel(self.client_buffer);
        self.register(name, &outbound).await?;
        Ok(ClientSession {
            name: name.to_string(),
            outbound,
            inbox,
            coordinator: self.clone(),
        })
    }

    /// Remove `name` and its pending guess; unknown names are ignored
    pub async fn unregister(&self, name: &str) -> CoordResult<bool> {
        debug!(%name, "CoordinatorHandle::unregister: called");
        self.request(|reply_tx| CoordRequest::Unregister {
            name: name.to_string(),
            reply_tx,
        })
        .await
    }

    pub async fn lookup(&self, name: &str) -> CoordResult<Option<ClientInfo>> {
        debug!(%name, "CoordinatorHandle::lookup: called");
        self.request(|reply_tx| CoordRequest::Lookup {
            name: name.to_string(),
            reply_tx,
        })
        .await
    }

    pub async fn submit_guess(&self, name: &str, value: i32) -> CoordResult<()> {
        debug!(%name, value, "CoordinatorHandle::submit_guess: called");
        self.request(|reply_tx| CoordRequest::SubmitGuess {
            name: name.to_string(),
            value,
            reply_tx,
        })
        .await?
    }

    pub async fn start_session(&self, target: Option<i32>) -> CoordResult<StartReport> {
        debug!(?target, "CoordinatorHandle::start_session: called");
        self.request(|reply_tx| CoordRequest::StartSession { target, reply_tx })
            .await?
    }

    pub async fn end_session(&self) -> CoordResult<EndReport> {
        debug!("CoordinatorHandle::end_session: called");
        self.request(|reply_tx| CoordRequest::EndSession { reply_tx }).await?
    }

    pub async fn grade_pending(&self, name: &str) -> CoordResult<GradeReport> {
        debug!(%name, "CoordinatorHandle::grade_pending: called");
        self.request(|reply_tx| CoordRequest::GradePending {
            name: name.to_string(),
            reply_tx,
        })
        .await?
    }

    pub async fn list_pending(&self) -> CoordResult<Vec<String>> {
        debug!("CoordinatorHandle::list_pending: called");
        self.request(|reply_tx| CoordRequest::ListPending { reply_tx }).await
    }

    pub async fn leaderboard(&self) -> CoordResult<LeaderboardSnapshot> {
        debug!("CoordinatorHandle::leaderboard: called");
        self.request(|reply_tx| CoordRequest::Leaderboard { reply_tx }).await
    }

    pub async fn list_clients(&self) -> CoordResult<Vec<ClientInfo>> {
        debug!("CoordinatorHandle::list_clients: called");
        self.request(|reply_tx| CoordRequest::ListClients { reply_tx }).await
    }

    pub async fn status(&self) -> CoordResult<StatusReport> {
        debug!("CoordinatorHandle::status: called");
        self.request(|reply_tx| CoordRequest::Status { reply_tx }).await
    }

    /// Request shutdown of the Coordinator
    pub async fn shutdown(&self) -> CoordResult<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }
}

/// A registered client as seen by its connection handler
///
/// The session owns the only strong sender of the client's outbound queue;
/// the registry keeps a weak one. Dropping the session closes the queue.
pub struct ClientSession {
    name: String,
    outbound: mpsc::Sender<Notice>,
    inbox: mpsc::Receiver<Notice>,
    coordinator: CoordinatorHandle,
}

impl ClientSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a guess on behalf of this client
    pub async fn guess(&self, value: i32) -> CoordResult<()> {
        self.coordinator.submit_guess(&self.name, value).await
    }

    /// Next notice from the coordinator; `None` once the queue is closed
    pub async fn recv(&mut self) -> Option<Notice> {
        self.inbox.recv().await
    }

    /// Split into the parts a connection handler drives separately
    pub fn into_parts(self) -> (SessionLink, mpsc::Receiver<Notice>) {
        let link = SessionLink {
            name: self.name,
            outbound: self.outbound,
            coordinator: self.coordinator,
        };
        (link, self.inbox)
    }

    /// Unregister and close the outbound queue
    pub async fn leave(self) -> CoordResult<bool> {
        let (link, _inbox) = self.into_parts();
        link.leave().await
    }
}

/// Sending half of a [`ClientSession`]
pub struct SessionLink {
    name: String,
    outbound: mpsc::Sender<Notice>,
    coordinator: CoordinatorHandle,
}

impl SessionLink {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn guess(&self, value: i32) -> CoordResult<()> {
        self.coordinator.submit_guess(&self.name, value).await
    }

    /// Unregister and drop the strong sender, ending the inbox stream
    pub async fn leave(self) -> CoordResult<bool> {
        let removed = self.coordinator.unregister(&self.name).await;
        drop(self.outbound);
        removed
    }
}
