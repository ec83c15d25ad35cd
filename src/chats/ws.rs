use axum::{
    debug_handler,
    extract::{Path, State, WebSocketUpgrade, ws::{Message as Frame, WebSocket}},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, auth::require_session};

use super::{ChatEvent, ensure_participant};

/// Tells a participant's client when to reload a chat's history.
#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatEvent>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let auth = require_session(&session).await?;
    let chat_id = chat_id.to_string();
    ensure_participant(&db_pool, &chat_id, &auth.user_id).await?;

    let rx = tx.subscribe();
    Ok(ws.on_upgrade(move |stream| watch(stream, rx, chat_id)).into_response())
}

async fn watch(stream: WebSocket, mut rx: broadcast::Receiver<ChatEvent>, chat_id: String) {
    let (mut sender, mut receiver) = stream.split();

    let mut notify_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) if event.chat_id == chat_id => event,
                Ok(_) => continue,
                // a missed notice may have been ours
                Err(RecvError::Lagged(_)) => ChatEvent { chat_id: chat_id.clone() },
                Err(RecvError::Closed) => break,
            };
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Frame::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // inbound frames are ignored, sending goes through POST
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_)) = receiver.next().await {}
    });

    tokio::select! {
        _ = &mut notify_task => recv_task.abort(),
        _ = &mut recv_task => notify_task.abort(),
    }
}
