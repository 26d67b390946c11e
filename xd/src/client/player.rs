//! Player client
//!
//! Connects to the player port, joins under a name and exchanges guesses
//! and grades with the server.

use colored::Colorize;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::coordinator::{Phase, TARGET_MAX, TARGET_MIN};
use crate::server::{DEFAULT_MAX_LINE, PlayerMessage, ServerMessage, read_frame, write_frame};

/// Server messages buffered between the socket reader and the caller
const INCOMING_BUFFER: usize = 64;

/// A connected player
pub struct PlayerClient {
    writer: OwnedWriteHalf,
    incoming: mpsc::Receiver<ServerMessage>,
}

impl PlayerClient {
    /// Connect to the server's player address
    pub async fn connect(addr: &str) -> Result<Self> {
        debug!(%addr, "PlayerClient::connect: called");
        let stream = TcpStream::connect(addr)
            .await
            .context(format!("Failed to connect to {}", addr))?;
        let (read_half, writer) = stream.into_split();

        let (tx, incoming) = mpsc::channel(INCOMING_BUFFER);
        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame::<_, ServerMessage>(&mut reader, DEFAULT_MAX_LINE).await {
                    Ok(Some(msg)) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "PlayerClient: error reading from server");
                        break;
                    }
                }
            }
        });

        Ok(Self { writer, incoming })
    }

    /// Send the handshake and wait for the server's answer
    ///
    /// Returns the phase and round reported in the welcome.
    pub async fn join(&mut self, name: &str) -> Result<(Phase, u64)> {
        self.send(&PlayerMessage::Join { name: name.to_string() }).await?;
        match self.recv().await {
            Some(ServerMessage::Welcome { phase, round, .. }) => Ok((phase, round)),
            Some(ServerMessage::Error { message }) => Err(eyre::eyre!("{}", message)),
            Some(other) => Err(eyre::eyre!("Unexpected message: {:?}", other)),
            None => Err(eyre::eyre!("Server closed the connection")),
        }
    }

    /// Submit a guess; the grade arrives later through [`PlayerClient::recv`]
    pub async fn guess(&mut self, number: i32) -> Result<()> {
        self.send(&PlayerMessage::Guess { number }).await
    }

    /// Next message from the server; `None` once the connection is closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    async fn send(&mut self, msg: &PlayerMessage) -> Result<()> {
        write_frame(&mut self.writer, msg).await
    }
}

/// Validate a line typed by the player
pub fn parse_guess(input: &str) -> Result<i32, String> {
    let number: i32 = input
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", input.trim()))?;
    if !(TARGET_MIN..=TARGET_MAX).contains(&number) {
        return Err(format!("Guess must be between {} and {}", TARGET_MIN, TARGET_MAX));
    }
    Ok(number)
}

/// Render a server message for the terminal
pub fn render(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::Welcome { name, phase, round } => match phase {
            Phase::Running => format!("Welcome {}! Round {} is running, make a guess.", name.bold(), round),
            _ => format!("Welcome {}! Waiting for the experiment to start.", name.bold()),
        },
        ServerMessage::Started { message, .. } => message.cyan().bold().to_string(),
        ServerMessage::Graded { guess, message, .. } => {
            let colored = if message == "Correct!" {
                message.green().bold()
            } else {
                message.yellow()
            };
            format!("{} {}", format!("[{}]", guess).dimmed(), colored)
        }
        ServerMessage::Ended { message, .. } => message.magenta().bold().to_string(),
        ServerMessage::Error { message } => format!("{} {}", "error:".red().bold(), message),
    }
}

/// Play from the terminal until stdin closes or the server goes away
pub async fn run_interactive(addr: &str, name: &str) -> Result<()> {
    let mut client = PlayerClient::connect(addr).await?;
    let (phase, round) = client.join(name).await?;
    println!(
        "{}",
        render(&ServerMessage::Welcome {
            name: name.to_string(),
            phase,
            round,
        })
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_guess(&line) {
                    Ok(number) => client.guess(number).await?,
                    Err(message) => println!("{} {}", "error:".red().bold(), message),
                }
            }
            msg = client.recv() => {
                let Some(msg) = msg else {
                    println!("{}", "Disconnected from server".red());
                    break;
                };
                println!("{}", render(&msg));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Verdict;

    #[test]
    fn test_parse_guess_accepts_range() {
        assert_eq!(parse_guess("1"), Ok(1));
        assert_eq!(parse_guess(" 100\n"), Ok(100));
    }

    #[test]
    fn test_parse_guess_rejects_out_of_range() {
        assert_eq!(parse_guess("0"), Err("Guess must be between 1 and 100".to_string()));
        assert!(parse_guess("101").is_err());
        assert!(parse_guess("-5").is_err());
    }

    #[test]
    fn test_parse_guess_rejects_text() {
        assert_eq!(parse_guess("fifty"), Err("'fifty' is not a number".to_string()));
    }

    #[test]
    fn test_render_graded_contains_message() {
        colored::control::set_override(false);
        let text = render(&ServerMessage::Graded {
            guess: 50,
            verdict: Verdict::Higher,
            message: "Higher!".to_string(),
        });
        assert_eq!(text, "[50] Higher!");
    }

    #[test]
    fn test_render_error() {
        colored::control::set_override(false);
        let text = render(&ServerMessage::error("Experiment is not running"));
        assert_eq!(text, "error: Experiment is not running");
    }
}
