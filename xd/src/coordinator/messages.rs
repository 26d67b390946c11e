//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::error::{CoordResult, FailedDelivery};
use super::leaderboard::LeaderboardSnapshot;
use super::registry::ClientInfo;
use super::session::Phase;

/// Announcement sent to every client when a round starts
pub const START_MESSAGE: &str = "Experiment started! Guess a number between 1 and 100.";

/// Announcement sent to every client when a round ends
pub const END_MESSAGE: &str = "Experiment ended!";

/// Outcome of grading a single guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Correct,
    Higher,
    Lower,
}

impl Verdict {
    /// Compare a guess against the target
    pub fn judge(guess: i32, target: i32) -> Self {
        match guess.cmp(&target) {
            std::cmp::Ordering::Equal => Self::Correct,
            std::cmp::Ordering::Less => Self::Higher,
            std::cmp::Ordering::Greater => Self::Lower,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Correct => "Correct!",
            Self::Higher => "Higher!",
            Self::Lower => "Lower!",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Messages pushed from the Coordinator to a client's outbound queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// A new round is running
    Started { round: u64 },

    /// The client's pending guess was graded
    Graded { guess: i32, verdict: Verdict },

    /// The current round is over
    Ended { round: u64 },
}

impl Notice {
    /// Human-readable text for the notice
    pub fn message(&self) -> String {
        match self {
            Self::Started { .. } => START_MESSAGE.to_string(),
            Self::Graded { verdict, .. } => verdict.message().to_string(),
            Self::Ended { .. } => END_MESSAGE.to_string(),
        }
    }
}

/// Result of `start_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub round: u64,
    pub notified: usize,
    #[serde(default)]
    pub failures: Vec<FailedDelivery>,
}

/// Result of `end_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndReport {
    pub round: u64,
    pub notified: usize,
    #[serde(default)]
    pub failures: Vec<FailedDelivery>,
    pub leaderboard: LeaderboardSnapshot,
    pub summary: String,
}

/// Result of `grade_pending`
///
/// A failed delivery does not undo the grading: the pending guess is
/// consumed and a correct answer is still counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    pub name: String,
    pub guess: i32,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailedDelivery>,
}

impl GradeReport {
    pub fn delivered(&self) -> bool {
        self.failure.is_none()
    }
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: Phase,
    pub round: u64,
    pub clients: usize,
    pub pending: usize,
    pub metrics: CoordinatorMetrics,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    pub requests_handled: u64,
    pub guesses_received: u64,
    pub guesses_graded: u64,
    pub notices_sent: u64,
    pub delivery_failures: u64,
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Register a client and its outbound queue
    Register {
        name: String,
        outbound: mpsc::WeakSender<Notice>,
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Remove a client and any guess it left pending
    Unregister {
        name: String,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Look up a connected client
    Lookup {
        name: String,
        reply_tx: oneshot::Sender<Option<ClientInfo>>,
    },

    /// Store a guess for later grading
    SubmitGuess {
        name: String,
        value: i32,
        reply_tx: oneshot::Sender<CoordResult<()>>,
    },

    /// Begin a round, optionally with a pinned target
    StartSession {
        target: Option<i32>,
        reply_tx: oneshot::Sender<CoordResult<StartReport>>,
    },

    /// Finish the current round
    EndSession {
        reply_tx: oneshot::Sender<CoordResult<EndReport>>,
    },

    /// Grade one client's pending guess
    GradePending {
        name: String,
        reply_tx: oneshot::Sender<CoordResult<GradeReport>>,
    },

    /// Clients waiting for a grade
    ListPending { reply_tx: oneshot::Sender<Vec<String>> },

    /// Copy of the leaderboard
    Leaderboard {
        reply_tx: oneshot::Sender<LeaderboardSnapshot>,
    },

    /// Snapshot of connected clients
    ListClients { reply_tx: oneshot::Sender<Vec<ClientInfo>> },

    /// Phase, round and counters
    Status { reply_tx: oneshot::Sender<StatusReport> },

    /// Shutdown the coordinator
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_judge() {
        assert_eq!(Verdict::judge(42, 42), Verdict::Correct);
        assert_eq!(Verdict::judge(10, 42), Verdict::Higher);
        assert_eq!(Verdict::judge(50, 42), Verdict::Lower);
    }

    #[test]
    fn test_verdict_messages() {
        assert_eq!(Verdict::Correct.to_string(), "Correct!");
        assert_eq!(Verdict::Higher.to_string(), "Higher!");
        assert_eq!(Verdict::Lower.to_string(), "Lower!");
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(Notice::Started { round: 1 }.message(), START_MESSAGE);
        assert_eq!(Notice::Ended { round: 1 }.message(), END_MESSAGE);
        let graded = Notice::Graded {
            guess: 50,
            verdict: Verdict::Lower,
        };
        assert_eq!(graded.message(), "Lower!");
    }

    #[test]
    fn test_grade_report_omits_missing_failure() {
        let report = GradeReport {
            name: "luna".to_string(),
            guess: 7,
            verdict: Verdict::Higher,
            failure: None,
        };
        assert!(report.delivered());
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("failure"));
        assert!(json.contains(r#""verdict":"higher""#));
    }
}
