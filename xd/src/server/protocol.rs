//! Wire messages and line framing
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON
//! followed by `\n`, on both the player connection and the operator socket.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::coordinator::{
    ClientInfo, EndReport, GradeReport, LeaderboardSnapshot, Notice, Phase, StartReport, StatusReport, Verdict,
};

/// Default maximum line size in bytes
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Messages from a player to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PlayerMessage {
    /// Handshake; must be the first message on a connection
    Join { name: String },

    /// A guess for the running round
    Guess { number: i32 },
}

/// Messages from the server to a player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Handshake accepted
    Welcome { name: String, phase: Phase, round: u64 },

    /// A round started
    Started { round: u64, message: String },

    /// The player's pending guess was graded
    Graded {
        guess: i32,
        verdict: Verdict,
        message: String,
    },

    /// The round ended
    Ended { round: u64, message: String },

    /// A request from the player was rejected
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        let message = notice.message();
        match notice {
            Notice::Started { round } => Self::Started { round, message },
            Notice::Graded { guess, verdict } => Self::Graded {
                guess,
                verdict,
                message,
            },
            Notice::Ended { round } => Self::Ended { round, message },
        }
    }
}

/// Operator requests on the control socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ControlRequest {
    /// Start a round, optionally with a pinned target
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<i32>,
    },

    /// End the running round
    End,

    /// Grade one player's pending guess
    Grade { name: String },

    /// Players waiting for a grade
    Pending,

    /// Current leaderboard
    Leaderboard,

    /// Connected players
    Clients,

    /// Phase, round and counters
    Status,

    /// Check the server is alive
    Ping,

    /// Stop the server
    Shutdown,
}

/// Responses on the control socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ControlResponse {
    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    Started { report: StartReport },

    Ended { report: EndReport },

    Graded { report: GradeReport },

    Pending { names: Vec<String> },

    Leaderboard { standings: LeaderboardSnapshot },

    Clients { clients: Vec<ClientInfo> },

    Status { report: StatusReport },

    /// Error response
    Error { message: String },
}

/// Errors while reading a frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message too large: more than {0} bytes")]
    TooLarge(usize),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read one JSON line. `Ok(None)` means the peer closed the stream.
///
/// `max_len` bounds the line without its terminator. Blank lines are
/// skipped; bytes that are not UTF-8 JSON are `Malformed`. Not cancel-safe:
/// drive it from a dedicated task rather than a `select!` branch.
pub async fn read_frame<R, T>(reader: &mut R, max_len: usize) -> Result<Option<T>, FrameError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        let mut line = Vec::new();
        let bytes_read = (&mut *reader)
            .take(max_len as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;

        if bytes_read == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        } else if bytes_read > max_len {
            return Err(FrameError::TooLarge(max_len));
        }

        let body = line.trim_ascii();
        if body.is_empty() {
            continue;
        }

        return Ok(Some(serde_json::from_slice(body)?));
    }
}

/// Write one message as a JSON line and flush
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> eyre::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    use eyre::Context;

    let json = serde_json::to_string(msg).context("Failed to serialize message")?;
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write message")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_join_serialize() {
        let msg = PlayerMessage::Join {
            name: "harry".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"Join","name":"harry"}"#);
    }

    #[test]
    fn test_guess_deserialize() {
        let msg: PlayerMessage = serde_json::from_str(r#"{"type":"Guess","number":42}"#).unwrap();
        assert_eq!(msg, PlayerMessage::Guess { number: 42 });
    }

    #[test]
    fn test_notice_to_server_message() {
        let msg = ServerMessage::from(Notice::Graded {
            guess: 50,
            verdict: Verdict::Lower,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"Graded","guess":50,"verdict":"lower","message":"Lower!"}"#
        );
    }

    #[test]
    fn test_start_request_without_target() {
        let json = serde_json::to_string(&ControlRequest::Start { target: None }).unwrap();
        assert_eq!(json, r#"{"type":"Start"}"#);
        let parsed: ControlRequest = serde_json::from_str(r#"{"type":"Start"}"#).unwrap();
        assert_eq!(parsed, ControlRequest::Start { target: None });
    }

    #[test]
    fn test_leaderboard_response_shape() {
        let standings: LeaderboardSnapshot = vec![("ron".to_string(), 2)].into_iter().collect();
        let json = serde_json::to_string(&ControlResponse::Leaderboard { standings }).unwrap();
        assert_eq!(json, r#"{"type":"Leaderboard","standings":{"ron":2}}"#);
    }

    #[tokio::test]
    async fn test_read_frames_until_eof() {
        let input: &[u8] = b"{\"type\":\"Join\",\"name\":\"A\"}\n\n{\"type\":\"Guess\",\"number\":7}\n";
        let mut reader = BufReader::new(input);

        let first: Option<PlayerMessage> = read_frame(&mut reader, 1024).await.unwrap();
        assert_eq!(first, Some(PlayerMessage::Join { name: "A".to_string() }));
        let second: Option<PlayerMessage> = read_frame(&mut reader, 1024).await.unwrap();
        assert_eq!(second, Some(PlayerMessage::Guess { number: 7 }));
        let end: Option<PlayerMessage> = read_frame(&mut reader, 1024).await.unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_line() {
        let long = format!("{{\"type\":\"Join\",\"name\":\"{}\"}}\n", "x".repeat(100));
        let mut reader = BufReader::new(long.as_bytes());
        let result: Result<Option<PlayerMessage>, _> = read_frame(&mut reader, 32).await;
        assert!(matches!(result, Err(FrameError::TooLarge(32))));
    }

    #[tokio::test]
    async fn test_read_frame_limit_excludes_newline() {
        let body = r#"{"type":"Guess","number":7}"#;
        let input = format!("{}\n", body);
        let mut reader = BufReader::new(input.as_bytes());
        let msg: Option<PlayerMessage> = read_frame(&mut reader, body.len()).await.unwrap();
        assert_eq!(msg, Some(PlayerMessage::Guess { number: 7 }));

        let mut reader = BufReader::new(input.as_bytes());
        let result: Result<Option<PlayerMessage>, _> = read_frame(&mut reader, body.len() - 1).await;
        assert!(matches!(result, Err(FrameError::TooLarge(_))));
    }

    #[tokio::test]
    async fn test_read_frame_invalid_utf8_is_malformed() {
        let input: &[u8] = b"\xff\xfe garbage\n{\"type\":\"Guess\",\"number\":3}\n";
        let mut reader = BufReader::new(input);

        let result: Result<Option<PlayerMessage>, _> = read_frame(&mut reader, 1024).await;
        assert!(matches!(result, Err(FrameError::Malformed(_))));
        let next: Option<PlayerMessage> = read_frame(&mut reader, 1024).await.unwrap();
        assert_eq!(next, Some(PlayerMessage::Guess { number: 3 }));
    }

    #[tokio::test]
    async fn test_read_frame_malformed() {
        let mut reader = BufReader::new(&b"not json\n"[..]);
        let result: Result<Option<PlayerMessage>, _> = read_frame(&mut reader, 1024).await;
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let mut out: Vec<u8> = Vec::new();
        write_frame(&mut out, &ControlResponse::Ok).await.unwrap();
        assert_eq!(out, b"{\"type\":\"Ok\"}\n");
    }
}
