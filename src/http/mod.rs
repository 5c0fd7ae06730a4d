//! `HTTPEndpoint` (spec §4.12): the non-WebSocket surface — session vending,
//! the debug variable browser, and a synchronous REST fallback for clients
//! that can't hold a socket open.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use strand_protocol::decode_frame;

use crate::session::{SessionHandle, SessionTask};
use crate::state::AppState;

const VARIABLES_HTML: &str = include_str!("../../assets/debug/variables.html");

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("no such session {0}")]
    SessionMissing(String),
    #[error("session executor gone")]
    SessionGone,
    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::SessionMissing(_) => StatusCode::NOT_FOUND,
            HttpError::SessionGone => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        warn!(error = %self, "http request failed");
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(new_session_redirect))
        .route("/healthz", get(healthz))
        .route("/ws/{session_id}", get(crate::ws::ws_handler))
        .route("/{session_id}/variables", get(variables_page))
        .route("/{session_id}/variables.json", get(variables_json))
        .route("/api/{message_type}", post(post_message))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `GET /`: vends a fresh session and redirects the client to it, the same
/// bootstrap the reference server uses for a browser landing cold (spec §8
/// "New session + root").
async fn new_session_redirect(State(state): State<AppState>) -> Response {
    let handle = state.create_session();
    Redirect::temporary(&format!("/{}/variables", handle.internal_id)).into_response()
}

/// Resolves a path segment as a session's `internalID` (spec §4.9). A
/// segment that isn't even a UUID can't name a session either way, so it
/// collapses to the same `SessionMissing` the caller would get for an
/// unknown-but-well-formed id.
fn resolve_session(state: &AppState, session_id: &str) -> Result<Arc<SessionHandle>, HttpError> {
    let internal_id = Uuid::parse_str(session_id)
        .map_err(|_| HttpError::SessionMissing(session_id.to_string()))?;
    state
        .sessions
        .get_by_internal(&internal_id)
        .ok_or_else(|| HttpError::SessionMissing(session_id.to_string()))
}

async fn variables_page(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    resolve_session(&state, &session_id)?;
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], VARIABLES_HTML))
}

#[derive(Deserialize)]
struct DumpQuery {
    #[serde(default)]
    diag: i32,
}

/// `GET /{sessionID}/variables.json`: a full snapshot of the variable graph,
/// fetched by posting a `Dump` onto the session's executor and waiting for
/// its reply on a `oneshot` channel (spec §6).
async fn variables_json(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<DumpQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let handle = resolve_session(&state, &session_id)?;

    let (reply_tx, reply_rx) = oneshot::channel();
    handle
        .task_tx
        .send(SessionTask::Dump {
            diag: query.diag,
            reply: reply_tx,
        })
        .map_err(|_| HttpError::SessionGone)?;

    let (change_count, snapshot) = reply_rx.await.map_err(|_| HttpError::SessionGone)?;
    Ok((
        [(
            "X-Change-Count",
            change_count.to_string(),
        )],
        Json(snapshot),
    ))
}

/// `POST /api/{messageType}`: a synchronous REST equivalent of sending a
/// single wire message over the socket, for clients that can't hold a
/// connection open. The body is the message's `data` object; the path
/// segment supplies `type`.
async fn post_message(
    State(state): State<AppState>,
    Path(message_type): Path<String>,
    axum::extract::Query(session_query): axum::extract::Query<SessionQuery>,
    body: String,
) -> Result<impl IntoResponse, HttpError> {
    let handle = resolve_session(&state, &session_query.session)?;

    let envelope = format!(r#"{{"type":"{message_type}","data":{body}}}"#);
    decode_frame(&envelope).map_err(|err| HttpError::BadRequest(err.to_string()))?;

    handle
        .task_tx
        .send(SessionTask::Frame {
            raw: envelope,
            conn: crate::session::ConnectionId::IMPLICIT,
        })
        .map_err(|_| HttpError::SessionGone)?;

    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct SessionQuery {
    session: String,
}
