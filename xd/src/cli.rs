//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// experimentd - guess-the-number experiment server
#[derive(Parser)]
#[command(
    name = "xd",
    about = "Run and operate a guess-the-number experiment",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/experimentd/logs/experimentd.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Override the control socket path
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the server in the foreground
    Serve {
        /// Player listen address (overrides config)
        #[arg(short, long)]
        listen: Option<String>,

        /// Fixed RNG seed for targets
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Join the experiment as a player
    Play {
        /// Player name
        #[arg(short, long)]
        name: String,

        /// Server address (defaults to the configured listen address)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Start a round
    Start {
        /// Pin the target instead of drawing it at random
        #[arg(short, long)]
        target: Option<i32>,
    },

    /// End the running round and show the leaderboard
    End,

    /// Grade a player's pending guess
    Grade {
        /// Player name
        name: String,
    },

    /// List players waiting for a grade
    Pending,

    /// Show the leaderboard
    Leaderboard {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List connected players
    Clients {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show phase, round and counters
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the server is alive
    Ping,

    /// Stop the running server
    Shutdown,

    /// Show server logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Output format for operator queries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("experimentd")
        .join("logs")
        .join("experimentd.log")
}
