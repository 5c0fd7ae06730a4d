//! `WebSocketEndpoint`: the `GET /ws/{sessionID}` upgrade handler (spec
//! §4.10). Owns the read pump (frames in) and a paired write pump (batches
//! out), bridging an axum `WebSocket` to a session's `SessionTask` channel.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::{SessionHandle, SessionTask};
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /ws/{sessionID}` binds on the `internalID` UUID (spec §4.9), same as
/// the debug variable-browser routes.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Ok(internal_id) = Uuid::parse_str(&session_id) else {
        return (StatusCode::NOT_FOUND, "no such session").into_response();
    };
    let Some(handle) = state.sessions.get_by_internal(&internal_id) else {
        return (StatusCode::NOT_FOUND, "no such session").into_response();
    };
    ws.on_upgrade(move |socket| handle_connection(socket, state, handle))
}

async fn handle_connection(socket: WebSocket, state: AppState, handle: Arc<SessionHandle>) {
    let (mut sender, mut receiver) = socket.split();
    let conn = state.connection_ids.next();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    if handle
        .task_tx
        .send(SessionTask::Connect { conn, tx: out_tx })
        .is_err()
    {
        warn!(session_id = %handle.vended_id, "session executor gone before connect");
        return;
    }
    info!(session_id = %handle.vended_id, "websocket connected");

    let write_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                frame = out_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                handle.touch().await;
                if handle
                    .task_tx
                    .send(SessionTask::Frame {
                        raw: text.to_string(),
                        conn,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(session_id = %handle.vended_id, error = %err, "websocket read error");
                break;
            }
        }
    }

    write_task.abort();
    let _ = handle.task_tx.send(SessionTask::Disconnect {
        conn,
        root_id: Some(1),
    });
    debug!(session_id = %handle.vended_id, "websocket disconnected");
}
