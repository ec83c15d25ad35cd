use axum::{Json, debug_handler, extract::{Path, State}, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, auth::require_session};

use super::{ChatEvent, ConversationSummary, Message, ensure_participant, load_messages, reload_conversations, resolve, send_message};

#[debug_handler]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let auth = require_session(&session).await?;
    Ok(Json(reload_conversations(&db_pool, &auth.user_id).await?))
}

#[derive(Deserialize)]
pub(crate) struct OpenDirectQuery {
    user_id: String,
}

#[debug_handler]
pub(crate) async fn open_direct(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(OpenDirectQuery { user_id }): Json<OpenDirectQuery>,
) -> AppResult<Json<Value>> {
    let auth = require_session(&session).await?;
    let chat_id = resolve(&db_pool, &auth.user_id, &user_id).await?;
    Ok(Json(json!({ "chat_id": chat_id })))
}

#[debug_handler]
pub(crate) async fn messages(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    let auth = require_session(&session).await?;
    let chat_id = chat_id.to_string();

    ensure_participant(&db_pool, &chat_id, &auth.user_id).await?;
    Ok(Json(load_messages(&db_pool, &chat_id).await?))
}

#[derive(Deserialize)]
pub(crate) struct SendMessageQuery {
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<ChatEvent>>,
    session: Session,
    Path(chat_id): Path<Uuid>,
    Json(SendMessageQuery { content }): Json<SendMessageQuery>,
) -> AppResult<StatusCode> {
    let auth = require_session(&session).await?;
    let chat_id = chat_id.to_string();

    send_message(&db_pool, &chat_id, &auth.user_id, &content).await?;
    let _ = tx.send(ChatEvent { chat_id });

    Ok(StatusCode::NO_CONTENT)
}
