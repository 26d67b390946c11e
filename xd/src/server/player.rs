//! Player connections
//!
//! One task per connection: a handshake naming the player, then a loop that
//! forwards guesses into the coordinator. A writer task drains the player's
//! outbound queue onto the socket.

use eyre::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{FrameError, PlayerMessage, ServerMessage, read_frame, write_frame};
use crate::coordinator::CoordinatorHandle;

/// Replies produced by the handler itself, outside the coordinator's queue
const REPLY_BUFFER: usize = 8;

/// Accept player connections until shutdown is signalled
pub async fn serve(
    listener: TcpListener,
    coordinator: CoordinatorHandle,
    max_line: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "Accepting player connections");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "serve: player connection accepted");
                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, coordinator, max_line).await {
                                warn!(%addr, error = %e, "Player connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: player accept error");
                    }
                }
            }

            _ = shutdown.wait_for(|stop| *stop) => {
                debug!("serve: shutdown signalled");
                break;
            }
        }
    }

    info!("Stopped accepting player connections");
    Ok(())
}

/// Drive a single player connection to completion
///
/// On return the player is unregistered, which also drops any guess it
/// left pending.
pub async fn handle_connection<S>(stream: S, coordinator: CoordinatorHandle, max_line: usize) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let conn_id = Uuid::now_v7();
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let Some(name) = handshake(&mut reader, &mut write_half, max_line, conn_id).await? else {
        return Ok(());
    };

    let session = match coordinator.join(&name).await {
        Ok(session) => session,
        Err(e) => {
            info!(%conn_id, %name, error = %e, "Rejected player");
            write_frame(&mut write_half, &ServerMessage::error(e.to_string())).await?;
            return Ok(());
        }
    };

    let status = match coordinator.status().await {
        Ok(status) => status,
        Err(e) => {
            let _ = session.leave().await;
            return Err(e.into());
        }
    };
    write_frame(
        &mut write_half,
        &ServerMessage::Welcome {
            name: name.clone(),
            phase: status.phase,
            round: status.round,
        },
    )
    .await?;
    info!(%conn_id, %name, "Client connected");

    let (link, mut inbox) = session.into_parts();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(REPLY_BUFFER);

    let writer_name = name.clone();
    let writer = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(notice) = inbox.recv() => ServerMessage::from(notice),
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };
            if let Err(e) = write_frame(&mut write_half, &msg).await {
                debug!(name = %writer_name, error = %e, "writer: stopping");
                break;
            }
        }
    });

    loop {
        let reply = match read_frame::<_, PlayerMessage>(&mut reader, max_line).await {
            Ok(Some(PlayerMessage::Guess { number })) => match link.guess(number).await {
                Ok(()) => continue,
                Err(e) => {
                    debug!(%name, number, error = %e, "Guess rejected");
                    ServerMessage::error(e.to_string())
                }
            },
            Ok(Some(PlayerMessage::Join { .. })) => ServerMessage::error("Already joined"),
            Ok(None) => break,
            Err(FrameError::Malformed(e)) => ServerMessage::error(format!("Malformed message: {}", e)),
            Err(e) => {
                warn!(%name, error = %e, "Error receiving message from client");
                break;
            }
        };

        if reply_tx.send(reply).await.is_err() {
            debug!(%name, "Writer gone, closing connection");
            break;
        }
    }

    link.leave().await.context("Failed to unregister client")?;
    drop(reply_tx);
    let _ = writer.await;
    info!(%conn_id, %name, "Client disconnected");
    Ok(())
}

/// Wait for a `Join`. Guesses before it are answered with an error.
async fn handshake<R, W>(reader: &mut R, writer: &mut W, max_line: usize, conn_id: Uuid) -> Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        match read_frame::<_, PlayerMessage>(reader, max_line).await {
            Ok(Some(PlayerMessage::Join { name })) => {
                let name = name.trim().to_string();
                debug!(%conn_id, %name, "handshake: join received");
                return Ok(Some(name));
            }
            Ok(Some(PlayerMessage::Guess { .. })) => {
                write_frame(writer, &ServerMessage::error("Join before guessing")).await?;
            }
            Ok(None) => {
                debug!(%conn_id, "handshake: closed before join");
                return Ok(None);
            }
            Err(FrameError::Malformed(e)) => {
                write_frame(writer, &ServerMessage::error(format!("Malformed message: {}", e))).await?;
            }
            Err(e) => return Err(e).context("Error receiving handshake"),
        }
    }
}
