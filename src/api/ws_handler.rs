use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::{error::AppError, ws::LiveEvent, AppState};

#[derive(Deserialize)]
pub struct WsAuth {
    pub token: Option<String>,
}

/// GET /ws?token=<jwt>
/// Browsers cannot set headers on the upgrade, so the token rides in the query.
/// The token is checked before the upgrade headers so anonymous callers always see 401.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(auth): Query<WsAuth>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(token) = auth.token.filter(|t| !t.is_empty()) else {
        return AppError::Unauthorized("Missing authorization token".into()).into_response();
    };
    let claims = match state.jwt.verify(&token) {
        Ok(claims) => claims,
        Err(_) => return AppError::Unauthorized("Invalid or expired token".into()).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    tracing::debug!("Live event stream opened by '{}'", claims.username);
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

/// Forwards live events until either side goes away. Pings are answered by the
/// websocket layer itself, so incoming frames only matter for close detection.
async fn stream_events(mut socket: WebSocket, state: Arc<AppState>) {
    let mut event_rx = state.event_tx.subscribe();

    loop {
        let outgoing = tokio::select! {
            event = event_rx.recv() => match event {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Live event client lagged, {} event(s) skipped", skipped);
                    LiveEvent::Resync { skipped }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        let text = match serde_json::to_string(&outgoing) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Dropping unserializable live event: {}", e);
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    tracing::debug!("Live event client disconnected");
}
