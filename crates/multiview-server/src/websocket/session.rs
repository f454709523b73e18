//! WebSocket session lifecycle: one admitted socket from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, CloseReason, Outbound};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::coordinator::router;
use crate::coordinator::session::Session;
use crate::metrics::{
    PARTICIPANTS_EVICTED_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer may keep flushing after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// `1001 Going Away`.
const CLOSE_GOING_AWAY: u16 = 1001;

/// Why the reader loop ended.
#[derive(Debug)]
enum Exit {
    /// Peer sent a close frame; echo it.
    PeerClosed(Option<CloseReason>),
    /// No pong within the heartbeat window.
    HeartbeatTimeout,
    /// Server is shutting down.
    Shutdown,
    /// Stream ended or errored without a close frame.
    Disconnected,
}

impl Exit {
    fn close_reason(self) -> Option<CloseReason> {
        match self {
            Self::PeerClosed(reason) => reason,
            Self::HeartbeatTimeout => Some(CloseReason {
                code: CLOSE_GOING_AWAY,
                reason: "heartbeat timeout".into(),
            }),
            Self::Shutdown => Some(CloseReason {
                code: CLOSE_GOING_AWAY,
                reason: "server shutting down".into(),
            }),
            Self::Disconnected => None,
        }
    }
}

/// Run a WebSocket session for an admitted participant.
///
/// 1. Forwards queued frames (relays, notices, pings, close) to the socket
/// 2. Dispatches incoming text and UTF-8 binary frames through the router
/// 3. Pings on the heartbeat interval and closes unresponsive sockets
/// 4. Echoes the peer's close code and reason
/// 5. Detaches the connection from the session on the way out
#[instrument(skip_all, fields(session = %session.name(), participant = %participant_id, connection = %connection.id))]
pub async fn run_ws_session(
    ws: WebSocket,
    session: Arc<Session>,
    participant_id: String,
    connection: Arc<ClientConnection>,
    outbound_rx: mpsc::Receiver<Outbound>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(write_outbound(ws_tx, outbound_rx));

    let heartbeat_cancel = shutdown.child_token();
    let mut heartbeat = tokio::spawn(run_heartbeat(
        connection.clone(),
        config.heartbeat_interval(),
        config.heartbeat_timeout(),
        heartbeat_cancel.clone(),
    ));

    let exit = loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            result = &mut heartbeat => {
                break match result {
                    Ok(HeartbeatResult::TimedOut) => {
                        warn!(
                            silent_for = ?connection.last_pong_elapsed(),
                            "client unresponsive, disconnecting"
                        );
                        Exit::HeartbeatTimeout
                    }
                    Ok(HeartbeatResult::Cancelled) => Exit::Shutdown,
                    Err(_) => Exit::Disconnected,
                };
            }
            () = shutdown.cancelled() => break Exit::Shutdown,
        };

        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(error)) => {
                debug!(%error, "socket read failed");
                break Exit::Disconnected;
            }
            None => break Exit::Disconnected,
        };

        connection.mark_alive();

        // Text and binary frames carry the same JSON
        match msg {
            Message::Text(text) => {
                let _ = router::dispatch(&session, text.as_str(), &connection);
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = router::dispatch(&session, text, &connection);
                }
                Err(_) => info!(len = data.len(), "received non-UTF8 binary frame"),
            },
            Message::Close(frame) => {
                let reason = frame.map(|f| CloseReason {
                    code: f.code,
                    reason: f.reason.to_string(),
                });
                info!(?reason, "client sent close frame");
                break Exit::PeerClosed(reason);
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    };

    // Clean up
    heartbeat_cancel.cancel();
    heartbeat.abort();

    let _ = connection.close(exit.close_reason());
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!("writer did not drain in time");
    }
    writer.abort();

    if let Some(evicted) = session.detach(&connection.id) {
        counter!(PARTICIPANTS_EVICTED_TOTAL).increment(1);
        debug!(participant = %evicted, "participant removed with its socket");
    }

    info!(
        dropped = connection.drop_count(),
        age = ?connection.age(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
}

/// Forward queued frames to the socket until a close frame is sent, the
/// queue closes, or the socket fails.
async fn write_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let (message, last) = match frame {
            Outbound::Text(text) => (Message::Text(text.as_str().into()), false),
            Outbound::Ping => (Message::Ping(Bytes::new()), false),
            Outbound::Close(reason) => (Message::Close(reason.map(close_frame)), true),
        };
        if ws_tx.send(message).await.is_err() || last {
            break;
        }
    }
}

fn close_frame(reason: CloseReason) -> CloseFrame {
    CloseFrame {
        code: reason.code,
        reason: reason.reason.into(),
    }
}
