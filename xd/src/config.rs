//! experimentd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::server::DEFAULT_MAX_LINE;

/// Main experimentd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listeners and framing limits
    pub server: ServerConfig,

    /// Coordinator queues and target generation
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.server.max_line_bytes == 0 {
            return Err(eyre::eyre!("server.max-line-bytes must be greater than 0"));
        }
        self.coordinator.validate()
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .experimentd.yml
        let local_config = PathBuf::from(".experimentd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/experimentd/experimentd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("experimentd").join("experimentd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP address players connect to
    pub listen: String,

    /// Unix socket for operator commands
    #[serde(rename = "control-socket")]
    pub control_socket: PathBuf,

    /// Longest accepted message line in bytes, not counting the newline
    #[serde(rename = "max-line-bytes")]
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:50051".to_string(),
            control_socket: default_socket_path(),
            max_line_bytes: DEFAULT_MAX_LINE,
        }
    }
}

/// Control socket path
///
/// Uses XDG_RUNTIME_DIR if available, then the local data dir, then /tmp.
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("experimentd")
        .join("control.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.listen, "127.0.0.1:50051");
        assert!(config.server.control_socket.ends_with("experimentd/control.sock"));
        assert_eq!(config.server.max_line_bytes, DEFAULT_MAX_LINE);
        assert_eq!(config.coordinator, CoordinatorConfig::default());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
server:
  listen: 0.0.0.0:6000
  control-socket: /run/xd/control.sock
  max-line-bytes: 512

coordinator:
  channel-buffer: 64
  client-buffer: 8
  seed: 7
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:6000");
        assert_eq!(config.server.control_socket, PathBuf::from("/run/xd/control.sock"));
        assert_eq!(config.server.max_line_bytes, 512);
        assert_eq!(config.coordinator.channel_buffer, 64);
        assert_eq!(config.coordinator.client_buffer, 8);
        assert_eq!(config.coordinator.seed, Some(7));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
server:
  listen: 127.0.0.1:0
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:0");
        assert_eq!(config.server.max_line_bytes, DEFAULT_MAX_LINE);
        assert_eq!(config.coordinator.client_buffer, 32);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("xd.yml");
        fs::write(&path, "coordinator:\n  seed: 99\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.coordinator.seed, Some(99));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_line() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.server.max_line_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max-line-bytes"));
    }

    #[test]
    fn test_load_rejects_zero_buffers() {
        let temp = TempDir::new().unwrap();

        for yaml in [
            "coordinator:\n  channel-buffer: 0\n",
            "coordinator:\n  client-buffer: 0\n",
            "server:\n  max-line-bytes: 0\n",
        ] {
            let path = temp.path().join("xd.yml");
            fs::write(&path, yaml).unwrap();
            let err = Config::load(Some(&path)).unwrap_err();
            assert!(format!("{:?}", err).contains("must be greater than 0"), "{}", yaml);
        }
    }
}
