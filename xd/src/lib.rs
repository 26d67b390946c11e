//! experimentd - guess-the-number experiment server
//!
//! Players connect over TCP, join under a unique name and submit guesses.
//! An operator starts and ends rounds and grades each player's latest guess
//! against a hidden target; correct grades earn a leaderboard win.
//!
//! # Modules
//!
//! - [`coordinator`] - Client registry, round state, pending guesses and leaderboard
//! - [`server`] - Player and operator network front ends
//! - [`client`] - Player and operator clients
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod server;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle};
pub use server::Server;

/// Version from git describe (set at compile time)
pub const VERSION: &str = env!("GIT_DESCRIBE");
