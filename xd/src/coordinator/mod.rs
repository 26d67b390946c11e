//! Experiment Coordinator
//!
//! Owns everything the experiment knows about: connected clients and their
//! outbound queues, the round lifecycle, ungraded guesses and the leaderboard.
//! A single task holds the state and applies requests one at a time, so
//! submissions, grading and round changes never interleave partially.
//!
//! Guesses are stored on submission and only answered when the operator
//! grades them:
//! - **submit:** record the client's latest guess, no reply
//! - **grade:** compare against the target, notify that client, consume the guess

mod config;
mod core;
mod error;
mod handle;
mod leaderboard;
mod messages;
mod pending;
mod registry;
mod session;
mod state;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use error::{CoordResult, CoordinatorError, DeliveryFailure, FailedDelivery};
pub use handle::{ClientSession, CoordinatorHandle, SessionLink};
pub use leaderboard::{Leaderboard, LeaderboardSnapshot};
pub use messages::{
    CoordRequest, CoordinatorMetrics, END_MESSAGE, EndReport, GradeReport, Notice, START_MESSAGE, StartReport,
    StatusReport, Verdict,
};
pub use pending::PendingGuessTable;
pub use registry::{Broadcast, ClientInfo, ClientRegistry};
pub use session::{Phase, SessionState, TARGET_MAX, TARGET_MIN, random_target};
pub use state::ExperimentState;
