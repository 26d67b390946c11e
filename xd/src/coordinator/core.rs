//! Main Coordinator task implementation

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::CoordRequest;
use super::state::ExperimentState;

/// The Coordinator owns the experiment state and serialises every change to it
pub struct Coordinator {
    config: CoordinatorConfig,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    state: ExperimentState,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration
    pub fn new(config: CoordinatorConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        let state = match config.seed {
            Some(seed) => ExperimentState::with_seed(seed),
            None => ExperimentState::new(),
        };
        Self { config, tx, rx, state }
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Handle for connection handlers and operator calls
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.config.client_buffer)
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    pub async fn run(mut self) {
        info!("Coordinator started");

        while let Some(req) = self.rx.recv().await {
            self.state.note_request();

            match req {
                CoordRequest::Register {
                    name,
                    outbound,
                    reply_tx,
                } => {
                    debug!(%name, "Registering client");
                    let _ = reply_tx.send(self.state.register(&name, outbound));
                }

                CoordRequest::Unregister { name, reply_tx } => {
                    debug!(%name, "Unregistering client");
                    let _ = reply_tx.send(self.state.unregister(&name));
                }

                CoordRequest::Lookup { name, reply_tx } => {
                    let _ = reply_tx.send(self.state.lookup(&name));
                }

                CoordRequest::SubmitGuess { name, value, reply_tx } => {
                    let _ = reply_tx.send(self.state.submit_guess(&name, value));
                }

                CoordRequest::StartSession { target, reply_tx } => {
                    let _ = reply_tx.send(self.state.start_session(target));
                }

                CoordRequest::EndSession { reply_tx } => {
                    let _ = reply_tx.send(self.state.end_session());
                }

                CoordRequest::GradePending { name, reply_tx } => {
                    let _ = reply_tx.send(self.state.grade_pending(&name));
                }

                CoordRequest::ListPending { reply_tx } => {
                    let _ = reply_tx.send(self.state.list_pending());
                }

                CoordRequest::Leaderboard { reply_tx } => {
                    let _ = reply_tx.send(self.state.leaderboard_snapshot());
                }

                CoordRequest::ListClients { reply_tx } => {
                    let _ = reply_tx.send(self.state.list_clients());
                }

                CoordRequest::Status { reply_tx } => {
                    let _ = reply_tx.send(self.state.status());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        info!("Coordinator stopped");
    }
}
