//! Coordinator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Outbound notices buffered per client before deliveries start failing
    #[serde(rename = "client-buffer", default = "default_client_buffer")]
    pub client_buffer: usize,

    /// Fixed RNG seed for reproducible targets (random if unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

fn default_client_buffer() -> usize {
    debug!("default_client_buffer: called");
    32
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            channel_buffer: 1000,
            client_buffer: 32,
            seed: None,
        }
    }
}

impl CoordinatorConfig {
    /// Reject buffer sizes the coordinator's channels cannot be built with
    pub fn validate(&self) -> eyre::Result<()> {
        if self.channel_buffer == 0 {
            return Err(eyre::eyre!("coordinator.channel-buffer must be greater than 0"));
        }
        if self.client_buffer == 0 {
            return Err(eyre::eyre!("coordinator.client-buffer must be greater than 0"));
        }
        Ok(())
    }
}
