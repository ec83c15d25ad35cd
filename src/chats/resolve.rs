use std::time::Duration;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db,
    error::{ChatError, is_unique_violation},
    profiles,
};

use super::{Role, participant_ids};

pub const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Store key for the unordered pair. The first id's length leads so ids containing
/// `:` cannot collide.
pub fn direct_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{lo}:{hi}", lo.len())
}

/// Finds or creates the one direct chat between `self_id` and `other_id`.
///
/// Concurrent callers for the same pair converge on one chat id: the store rejects a
/// second chat with the same pair key, and the loser of that race rescans and returns
/// the winner's chat.
pub async fn resolve(db_pool: &SqlitePool, self_id: &str, other_id: &str) -> Result<String, ChatError> {
    if self_id == other_id {
        return Err(ChatError::InvalidParticipant);
    }

    for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
        if let Some(chat_id) = find_direct(db_pool, self_id, other_id).await? {
            return Ok(chat_id);
        }

        if attempt == 1 && profiles::get_profile(db_pool, other_id).await?.is_none() {
            return Err(ChatError::NotFound);
        }

        match create_direct(db_pool, self_id, other_id).await {
            Ok(chat_id) => {
                tracing::info!(%chat_id, %self_id, %other_id, "direct chat created");
                return Ok(chat_id);
            }
            Err(ChatError::DirectChatConflict) => {
                tracing::debug!(%self_id, %other_id, attempt, "lost direct chat race, rescanning");
                tokio::time::sleep(Duration::from_millis(rand::random_range(5..25))).await;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::warn!(%self_id, %other_id, "direct chat conflict persisted after rescans");
    Err(ChatError::DirectChatConflict)
}

/// Scans the non-group chats of `self_id` for one whose participants are exactly the pair.
pub async fn find_direct(db_pool: &SqlitePool, self_id: &str, other_id: &str) -> Result<Option<String>, ChatError> {
    let candidates: Vec<(String,)> = sqlx::query_as(
        r#"SELECT c.id FROM chats c
           JOIN chat_participants p ON p.chat_id = c.id
           WHERE p.user_id = ? AND c.is_group = 0
           ORDER BY c.created_at, c.rowid"#,
    )
    .bind(self_id)
    .fetch_all(db_pool)
    .await?;

    for (chat_id,) in candidates {
        let members = participant_ids(db_pool, &chat_id).await?;
        if members.len() == 2
            && members.iter().any(|m| m == self_id)
            && members.iter().any(|m| m == other_id)
        {
            return Ok(Some(chat_id));
        }
    }

    Ok(None)
}

/// Inserts the chat and both participants as one transaction.
///
/// Fails with `DirectChatConflict` when a chat for the pair already exists.
pub async fn create_direct(db_pool: &SqlitePool, self_id: &str, other_id: &str) -> Result<String, ChatError> {
    let chat_id = Uuid::now_v7().to_string();
    let now = db::now_micros();

    let mut tx = db_pool.begin().await?;

    sqlx::query("INSERT INTO chats (id,name,is_group,created_by,direct_key,created_at,updated_at) VALUES (?,NULL,0,?,?,?,?)")
        .bind(&chat_id)
        .bind(self_id)
        .bind(direct_key(self_id, other_id))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { ChatError::DirectChatConflict } else { e.into() })?;

    sqlx::query("INSERT INTO chat_participants (chat_id,user_id,role,joined_at) VALUES (?,?,?,?),(?,?,?,?)")
        .bind(&chat_id)
        .bind(self_id)
        .bind(Role::Admin.as_str())
        .bind(now)
        .bind(&chat_id)
        .bind(other_id)
        .bind(Role::Member.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(chat_id)
}
