//! WebSocket connection lifecycle.
//!
//! One reader loop per socket decodes frames and hands them to the hub; a
//! writer task drains the connection's outbound queue. Sends are
//! fire-and-forget.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::http::routes::AppState;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::util::id::{ConnectionId, PlayerId};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    /// Id from an earlier connection, presented to resume an unfinished game.
    pub player_id: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let presented = params.player_id.and_then(|raw| match raw.parse::<PlayerId>() {
        Ok(id) => Some(id),
        Err(err) => {
            debug!(%raw, %err, "ignoring unparseable player id");
            None
        }
    });
    ws.on_upgrade(move |socket| handle_socket(state, presented, socket))
}

async fn handle_socket(state: AppState, presented: Option<PlayerId>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = ConnectionId::next();
    let player = state.hub.connect(conn, presented, tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%err, "failed to encode outbound message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => state.hub.handle(player, msg),
                Err(err) => {
                    warn!(%player, %err, "malformed message");
                    let _ = tx.send(ServerMessage::Error { message: format!("Bad message: {}", err) });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(err) => {
                debug!(%player, %err, "socket error");
                break;
            }
        }
    }

    state.hub.disconnect(conn);
    drop(tx);
    writer.abort();
}
