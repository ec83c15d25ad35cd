use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{auth::AuthSession, db, error::ChatError};

use super::{Message, ensure_participant, load_messages, send_message};

pub const GROUP_FALLBACK_TITLE: &str = "Group chat";
pub const UNKNOWN_USER_TITLE: &str = "Unknown user";

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub is_group: bool,
    /// The other participant of a direct chat
    pub counterpart_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Every chat `self_id` takes part in, most recently active first.
pub async fn reload_conversations(db_pool: &SqlitePool, self_id: &str) -> Result<Vec<ConversationSummary>, ChatError> {
    let chats: Vec<(String, Option<String>, bool, i64)> = sqlx::query_as(
        r#"SELECT c.id, c.name, c.is_group, c.updated_at FROM chats c
           JOIN chat_participants p ON p.chat_id = c.id
           WHERE p.user_id = ?
           ORDER BY c.updated_at DESC, c.rowid DESC"#,
    )
    .bind(self_id)
    .fetch_all(db_pool)
    .await?;

    let mut summaries = Vec::with_capacity(chats.len());
    for (id, name, is_group, updated_at) in chats {
        let (title, counterpart_id) = if is_group {
            let title = name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| GROUP_FALLBACK_TITLE.to_owned());
            (title, None)
        } else {
            let counterpart: Option<(String, Option<String>)> = sqlx::query_as(
                r#"SELECT p.user_id, u.username FROM chat_participants p
                   LEFT JOIN user_profiles u ON u.id = p.user_id
                   WHERE p.chat_id = ? AND p.user_id <> ?
                   LIMIT 1"#,
            )
            .bind(&id)
            .bind(self_id)
            .fetch_optional(db_pool)
            .await?;

            match counterpart {
                Some((user_id, username)) => (
                    username.unwrap_or_else(|| UNKNOWN_USER_TITLE.to_owned()),
                    Some(user_id),
                ),
                None => (UNKNOWN_USER_TITLE.to_owned(), None),
            }
        };

        summaries.push(ConversationSummary {
            id,
            title,
            is_group,
            counterpart_id,
            updated_at: db::from_micros(updated_at)?,
        });
    }

    Ok(summaries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewState {
    Unloaded,
    Loading,
    Loaded,
}

/// One session's view of its chats and of the selected chat's history.
///
/// Both lists are replaced wholesale on every reload. Sending never touches the cached
/// history, so what is shown is always the store's order.
pub struct ConversationStore {
    db_pool: SqlitePool,
    session: AuthSession,
    conversations: Vec<ConversationSummary>,
    selected: Option<String>,
    messages: Vec<Message>,
    state: ViewState,
}

impl ConversationStore {
    pub fn new(db_pool: SqlitePool, session: AuthSession) -> Self {
        ConversationStore {
            db_pool,
            session,
            conversations: Vec::new(),
            selected: None,
            messages: Vec::new(),
            state: ViewState::Unloaded,
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub async fn reload_conversations(&mut self) -> Result<&[ConversationSummary], ChatError> {
        self.conversations = reload_conversations(&self.db_pool, &self.session.user_id).await?;
        Ok(&self.conversations)
    }

    /// Selects `chat_id` and replaces the cached history with the stored one.
    ///
    /// On failure the previous selection, history and state are left as they were.
    pub async fn load_messages(&mut self, chat_id: &str) -> Result<&[Message], ChatError> {
        let previous = self.state;
        self.state = ViewState::Loading;
        self.finish_load(chat_id, previous).await
    }

    async fn finish_load(&mut self, chat_id: &str, previous: ViewState) -> Result<&[Message], ChatError> {
        let loaded = match ensure_participant(&self.db_pool, chat_id, &self.session.user_id).await {
            Ok(()) => load_messages(&self.db_pool, chat_id).await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(messages) => {
                self.selected = Some(chat_id.to_owned());
                self.messages = messages;
                self.state = ViewState::Loaded;
                Ok(&self.messages)
            }
            Err(e) => {
                tracing::warn!(%chat_id, error = %e, "loading messages failed");
                self.state = previous;
                Err(e)
            }
        }
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        send_message(&self.db_pool, chat_id, &self.session.user_id, text).await
    }

    /// Sends, then reloads the history so it includes the new message.
    ///
    /// The view is `Loading` from the send until the reload finishes. A rejected send puts
    /// the previous state back.
    pub async fn send_and_reload(&mut self, chat_id: &str, text: &str) -> Result<&[Message], ChatError> {
        let previous = self.state;
        self.state = ViewState::Loading;

        if let Err(e) = self.send_message(chat_id, text).await {
            self.state = previous;
            return Err(e);
        }
        self.finish_load(chat_id, previous).await
    }
}
