//! Session lifecycle: NotStarted -> Running -> Ended -> Running ...

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{CoordResult, CoordinatorError};

/// Smallest value a target can take
pub const TARGET_MIN: i32 = 1;

/// Largest value a target can take
pub const TARGET_MAX: i32 = 100;

/// Lifecycle phase of the experiment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    NotStarted,
    Running,
    Ended,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Pick a uniformly random target in `TARGET_MIN..=TARGET_MAX`
pub fn random_target<R: Rng>(rng: &mut R) -> i32 {
    rng.random_range(TARGET_MIN..=TARGET_MAX)
}

/// Current phase, target and round counter
#[derive(Debug, Default)]
pub struct SessionState {
    phase: Phase,
    target: Option<i32>,
    round: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// The target, only while running
    pub fn target(&self) -> Option<i32> {
        self.target
    }

    /// Number of the current (or most recent) round; 0 before the first start
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The target of the running round, or `SessionNotRunning`
    pub fn require_running(&self) -> CoordResult<i32> {
        match (self.phase, self.target) {
            (Phase::Running, Some(target)) => Ok(target),
            _ => Err(CoordinatorError::SessionNotRunning),
        }
    }

    /// Enter Running with the given target and return the new round number
    ///
    /// A running round is never reset; the target is left untouched on error.
    pub fn begin(&mut self, target: i32) -> CoordResult<u64> {
        debug!(phase = %self.phase, "SessionState::begin: called");
        if self.is_running() {
            return Err(CoordinatorError::AlreadySessionActive);
        }
        if !(TARGET_MIN..=TARGET_MAX).contains(&target) {
            return Err(CoordinatorError::TargetOutOfRange(target));
        }

        self.phase = Phase::Running;
        self.target = Some(target);
        self.round += 1;
        info!(round = self.round, target, "Experiment started");
        Ok(self.round)
    }

    /// Leave Running and return the round that just ended
    pub fn finish(&mut self) -> CoordResult<u64> {
        debug!(phase = %self.phase, "SessionState::finish: called");
        if !self.is_running() {
            return Err(CoordinatorError::NoActiveSession);
        }

        self.phase = Phase::Ended;
        self.target = None;
        info!(round = self.round, "Experiment ended");
        Ok(self.round)
    }
}
