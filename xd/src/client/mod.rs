//! Clients for the two server planes

mod control;
mod player;

pub use control::ControlClient;
pub use player::{PlayerClient, parse_guess, render, run_interactive};
