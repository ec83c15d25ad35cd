use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db, error::ChatError};

use super::ensure_participant;

/// Only `Text` is ever written; the other tags are reserved for attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    Voice,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
            MessageType::Voice => "voice",
        }
    }
}

impl FromStr for MessageType {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            "voice" => Ok(MessageType::Voice),
            other => Err(ChatError::Remote(format!("unknown message type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    sender_id: String,
    content: String,
    message_type: String,
    file_url: Option<String>,
    created_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = ChatError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: row.message_type.parse()?,
            file_url: row.file_url,
            created_at: db::from_micros(row.created_at)?,
        })
    }
}

/// Full history of a chat, oldest first. Messages stored in the same microsecond keep
/// insertion order.
pub async fn load_messages(db_pool: &SqlitePool, chat_id: &str) -> Result<Vec<Message>, ChatError> {
    let rows: Vec<MessageRow> = sqlx::query_as(
        r#"SELECT id,chat_id,sender_id,content,message_type,file_url,created_at FROM messages
           WHERE chat_id=?
           ORDER BY created_at, rowid"#,
    )
    .bind(chat_id)
    .fetch_all(db_pool)
    .await?;

    rows.into_iter().map(Message::try_from).collect()
}

/// Stores a text message and bumps the chat's `updated_at`.
///
/// Nothing is cached here; callers reload the history to see the message.
pub async fn send_message(db_pool: &SqlitePool, chat_id: &str, sender_id: &str, text: &str) -> Result<(), ChatError> {
    let content = text.trim();
    if content.is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    ensure_participant(db_pool, chat_id, sender_id).await?;

    let id = Uuid::now_v7();
    let now = db::now_micros();
    let mut tx = db_pool.begin().await?;

    sqlx::query("INSERT INTO messages (id,chat_id,sender_id,content,message_type,file_url,created_at) VALUES (?,?,?,?,?,NULL,?)")
        .bind(id.to_string())
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(MessageType::Text.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE chats SET updated_at=? WHERE id=?")
        .bind(now)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(%chat_id, %sender_id, message_id = %id, "message stored");
    Ok(())
}
