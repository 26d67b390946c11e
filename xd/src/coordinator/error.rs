//! Coordinator error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a notification could not be handed to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryFailure {
    /// The client's bounded outbound queue is full
    QueueFull,
    /// The connection handler dropped its end of the queue
    Disconnected,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueFull => write!(f, "outbound queue full"),
            Self::Disconnected => write!(f, "client channel closed"),
        }
    }
}

/// A single recipient that missed a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub name: String,
    pub reason: DeliveryFailure,
}

impl FailedDelivery {
    pub fn new(name: impl Into<String>, reason: DeliveryFailure) -> Self {
        Self {
            name: name.into(),
            reason,
        }
    }
}

/// Errors returned by coordinator operations
///
/// Every variant is recoverable: it goes back to the immediate caller and
/// never takes the coordinator down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Client '{0}' is already connected")]
    AlreadyConnected(String),

    #[error("Client name cannot be empty")]
    InvalidIdentity,

    #[error("Client '{0}' not found")]
    UnknownClient(String),

    #[error("Experiment is not running")]
    SessionNotRunning,

    #[error("Experiment has already started")]
    AlreadySessionActive,

    #[error("No active experiment to end")]
    NoActiveSession,

    #[error("No pending guess for client '{0}'")]
    NoPendingGuess(String),

    #[error("Target {0} is outside 1..=100")]
    TargetOutOfRange(i32),

    #[error("Failed to notify client '{}': {}", .0.name, .0.reason)]
    NotificationDeliveryFailed(FailedDelivery),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

impl From<FailedDelivery> for CoordinatorError {
    fn from(failure: FailedDelivery) -> Self {
        Self::NotificationDeliveryFailed(failure)
    }
}

/// Result alias for coordinator operations
pub type CoordResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CoordinatorError::AlreadyConnected("harry".to_string()).to_string(),
            "Client 'harry' is already connected"
        );
        assert_eq!(CoordinatorError::SessionNotRunning.to_string(), "Experiment is not running");
        assert_eq!(
            CoordinatorError::NoPendingGuess("ron".to_string()).to_string(),
            "No pending guess for client 'ron'"
        );
    }

    #[test]
    fn test_delivery_failure_converts() {
        let err: CoordinatorError = FailedDelivery::new("hermione", DeliveryFailure::QueueFull).into();
        assert_eq!(err.to_string(), "Failed to notify client 'hermione': outbound queue full");
    }

    #[test]
    fn test_delivery_failure_serialization() {
        let json = serde_json::to_string(&FailedDelivery::new("neville", DeliveryFailure::Disconnected)).unwrap();
        assert_eq!(json, r#"{"name":"neville","reason":"disconnected"}"#);
    }
}
