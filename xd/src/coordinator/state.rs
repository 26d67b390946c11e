//! ExperimentState - registry, session, pending guesses and leaderboard
//!
//! Every operation here runs to completion before the next one starts: the
//! Coordinator task is the only owner and handles one request at a time.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::{CoordResult, CoordinatorError};
use super::leaderboard::{Leaderboard, LeaderboardSnapshot};
use super::messages::{CoordinatorMetrics, EndReport, GradeReport, Notice, StartReport, StatusReport, Verdict};
use super::pending::PendingGuessTable;
use super::registry::{ClientInfo, ClientRegistry};
use super::session::{SessionState, random_target};

/// All mutable state of one experiment
pub struct ExperimentState {
    registry: ClientRegistry,
    session: SessionState,
    pending: PendingGuessTable,
    leaderboard: Leaderboard,
    metrics: CoordinatorMetrics,
    rng: StdRng,
}

impl Default for ExperimentState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic targets, for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            registry: ClientRegistry::new(),
            session: SessionState::new(),
            pending: PendingGuessTable::new(),
            leaderboard: Leaderboard::new(),
            metrics: CoordinatorMetrics::default(),
            rng,
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn register(&mut self, name: &str, outbound: mpsc::WeakSender<Notice>) -> CoordResult<()> {
        self.registry.register(name, outbound)?;
        self.leaderboard.ensure(name);
        info!(%name, clients = self.registry.len(), "Client connected");
        Ok(())
    }

    /// Drop a client and any guess it left behind. The leaderboard entry stays.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.registry.unregister(name);
        let discarded = self.pending.take(name);
        if removed {
            info!(%name, ?discarded, "Client disconnected");
        }
        removed
    }

    pub fn lookup(&self, name: &str) -> Option<ClientInfo> {
        self.registry.lookup(name)
    }

    pub fn list_clients(&self) -> Vec<ClientInfo> {
        self.registry.list()
    }

    /// Record a guess for later grading. Nothing is sent to the client.
    pub fn submit_guess(&mut self, name: &str, value: i32) -> CoordResult<()> {
        debug!(%name, value, "ExperimentState::submit_guess: called");
        self.session.require_running()?;
        let guesses = self.registry.record_guess(name, value)?;
        self.pending.submit(name, value);
        self.metrics.guesses_received += 1;
        debug!(%name, value, guesses, "Stored guess (pending response)");
        Ok(())
    }

    /// Start a round with a random target, or with `pinned` if given
    pub fn start_session(&mut self, pinned: Option<i32>) -> CoordResult<StartReport> {
        debug!(?pinned, "ExperimentState::start_session: called");
        if self.session.is_running() {
            return Err(CoordinatorError::AlreadySessionActive);
        }
        let target = pinned.unwrap_or_else(|| random_target(&mut self.rng));
        let round = self.session.begin(target)?;

        self.registry.reset_round();
        self.pending.clear();

        let outcome = self.registry.broadcast(&Notice::Started { round });
        self.count_deliveries(outcome.delivered, outcome.failures.len());

        Ok(StartReport {
            round,
            notified: outcome.delivered,
            failures: outcome.failures,
        })
    }

    /// End the round, drop ungraded guesses and hand back the final standings
    pub fn end_session(&mut self) -> CoordResult<EndReport> {
        debug!("ExperimentState::end_session: called");
        let round = self.session.finish()?;
        let dropped = self.pending.clear();
        if dropped > 0 {
            warn!(dropped, "Ungraded guesses discarded at end of round");
        }

        let outcome = self.registry.broadcast(&Notice::Ended { round });
        self.count_deliveries(outcome.delivered, outcome.failures.len());

        let leaderboard = self.leaderboard.snapshot();
        let summary = leaderboard.render("Final leaderboard");
        Ok(EndReport {
            round,
            notified: outcome.delivered,
            failures: outcome.failures,
            leaderboard,
            summary,
        })
    }

    /// Grade one client's pending guess and tell that client the outcome
    ///
    /// The pending guess is consumed whatever the verdict.
    pub fn grade_pending(&mut self, name: &str) -> CoordResult<GradeReport> {
        debug!(%name, "ExperimentState::grade_pending: called");
        let target = self.session.require_running()?;
        if !self.registry.contains(name) {
            return Err(CoordinatorError::UnknownClient(name.to_string()));
        }
        let guess = self
            .pending
            .take(name)
            .ok_or_else(|| CoordinatorError::NoPendingGuess(name.to_string()))?;

        let verdict = Verdict::judge(guess, target);
        if verdict == Verdict::Correct {
            let wins = self.leaderboard.record_win(name);
            info!(%name, wins, "Correct guess");
        }
        self.metrics.guesses_graded += 1;

        let failure = self.registry.send(name, Notice::Graded { guess, verdict }).err();
        match failure {
            Some(_) => self.count_deliveries(0, 1),
            None => self.count_deliveries(1, 0),
        }
        info!(%name, guess, %verdict, delivered = failure.is_none(), "Sent response to client");

        Ok(GradeReport {
            name: name.to_string(),
            guess,
            verdict,
            failure,
        })
    }

    pub fn list_pending(&self) -> Vec<String> {
        self.pending.identities()
    }

    pub fn leaderboard_snapshot(&self) -> LeaderboardSnapshot {
        self.leaderboard.snapshot()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            phase: self.session.phase(),
            round: self.session.round(),
            clients: self.registry.len(),
            pending: self.pending.len(),
            metrics: self.metrics.clone(),
        }
    }

    pub(crate) fn note_request(&mut self) {
        self.metrics.requests_handled += 1;
    }

    fn count_deliveries(&mut self, delivered: usize, failed: usize) {
        self.metrics.notices_sent += delivered as u64;
        self.metrics.delivery_failures += failed as u64;
    }
}
