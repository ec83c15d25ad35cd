//! Conversations: direct-chat resolution, message history and the per-session view of both.

mod msg;
mod resolve;
mod room;
mod store;
mod ws;

pub use msg::{Message, MessageType, load_messages, send_message};
pub use resolve::{MAX_RESOLVE_ATTEMPTS, create_direct, direct_key, find_direct, resolve};
pub use store::{
    ConversationStore, ConversationSummary, GROUP_FALLBACK_TITLE, UNKNOWN_USER_TITLE, ViewState,
    reload_conversations,
};

use axum::{Router, routing::{get, post}};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{AppState, error::ChatError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(room::list))
        .route("/direct", post(room::open_direct))
        .route("/{uuid}/messages", get(room::messages).post(room::post_message))
        .route("/{uuid}/ws", get(ws::chat_ws))
}

/// Pushed to watchers of a chat after its history changed. Carries no payload;
/// receivers reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    pub chat_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

pub async fn participant_ids(db_pool: &SqlitePool, chat_id: &str) -> Result<Vec<String>, ChatError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT user_id FROM chat_participants WHERE chat_id=?")
        .bind(chat_id)
        .fetch_all(db_pool)
        .await?;
    Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
}

pub async fn ensure_participant(db_pool: &SqlitePool, chat_id: &str, user_id: &str) -> Result<(), ChatError> {
    let found = sqlx::query("SELECT 1 FROM chat_participants WHERE chat_id=? AND user_id=?")
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(ChatError::NotParticipant),
    }
}
