use std::time::Duration;

use axum::{
    extract::{
        FromRequestParts, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, Uri, request::Parts},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::gateway::error::GatewayError;
use crate::gateway::state::AppState;
use crate::session::{ServerEvent, SessionController};
use crate::transport::{ConnectionSink, OutboundMessage};

pub const SESSION_ID_HEADER: &str = "session-id";
pub const SESSION_ID_HEADER_ALIAS: &str = "phone-id";
pub const MAX_SESSION_ID_LEN: usize = 128;

/// How long the socket writer may keep flushing after the session ended.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

/// Session identity of a connection, taken from the `session-id` header (alias
/// `phone-id`) or the `session_id` query parameter, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Result<Self, GatewayError> {
        let from_header = [SESSION_ID_HEADER, SESSION_ID_HEADER_ALIAS]
            .iter()
            .find_map(|name| headers.get(*name))
            .map(|value| {
                value.to_str().map(str::to_string).map_err(|_| {
                    GatewayError::InvalidRequest("session id is not valid text".to_string())
                })
            })
            .transpose()?;

        let raw = match from_header {
            Some(id) => Some(id),
            None => {
                let Query(query) = Query::<SessionQuery>::try_from_uri(uri)
                    .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
                query.session_id
            }
        };

        let id = raw
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(GatewayError::MissingSessionId)?;

        if id.chars().count() > MAX_SESSION_ID_LEN {
            return Err(GatewayError::InvalidRequest(format!(
                "session id longer than {} characters",
                MAX_SESSION_ID_LEN
            )));
        }
        Ok(Self(id))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(&parts.headers, &parts.uri)
    }
}

/// `GET /ws`: upgrades to the token/answer protocol.
pub async fn ws_handler(
    SessionId(session_id): SessionId,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

fn into_ws(message: OutboundMessage) -> Message {
    match message {
        OutboundMessage::Text(text) => Message::Text(text.into()),
        OutboundMessage::Binary(data) => Message::Binary(data.into()),
        OutboundMessage::Pong(data) => Message::Pong(data.into()),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sink, mut out_rx) = ConnectionSink::channel();

    // single writer: everything reaches the socket through `sink`
    let mut writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if ws_tx.send(into_ws(message)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let session_token = state.shutdown.child_token();
    let connection_id = state.registry.register(&session_id, session_token.clone());
    info!(session_id = %session_id, connection_id = %connection_id, "Session connected");

    let mut controller = SessionController::new(
        session_id.clone(),
        sink.clone(),
        state.services.clone(),
        state.session_config.clone(),
        session_token.clone(),
    );

    if controller.announce().is_ok() {
        loop {
            let next = tokio::select! {
                _ = session_token.cancelled() => {
                    debug!(session_id = %session_id, "Session cancelled");
                    break;
                }
                next = ws_rx.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            };

            match message {
                Message::Text(text) => {
                    controller.handle_text(text.as_str()).await;
                }
                Message::Binary(_) => {
                    let _ = sink.send_json(&ServerEvent::error("binary messages are not supported"));
                }
                Message::Ping(payload) => {
                    let _ = sink.send(OutboundMessage::Pong(payload.to_vec()));
                }
                Message::Pong(_) => {}
                Message::Close(_) => break,
            }

            if sink.is_closed() {
                debug!(session_id = %session_id, "Writer gone; ending session");
                break;
            }
        }
    }

    state.registry.unregister(&session_id, connection_id);
    controller.shutdown().await;
    drop(sink);

    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(session_id = %session_id, connection_id = %connection_id, "Session closed");
}
