use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;

use crate::error::ChatError;

// unique: user_profiles.username (case-sensitive)
// unique: user_profiles.login_email, fixed at signup so renames keep the provider account
// unique: chats.direct_key, one non-group chat per unordered pair; NULL for groups
// unique: chat_participants (chat_id, user_id)
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS user_profiles (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        username_lower TEXT NOT NULL,
        login_email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        theme TEXT NOT NULL DEFAULT 'light',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        name TEXT,
        is_group INTEGER NOT NULL,
        created_by TEXT NOT NULL,
        direct_key TEXT UNIQUE,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (is_group = 1 OR direct_key IS NOT NULL)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chat_participants (
        chat_id TEXT NOT NULL REFERENCES chats(id),
        user_id TEXT NOT NULL,
        role TEXT NOT NULL,
        joined_at INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS chat_participants_user ON chat_participants(user_id)",
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL REFERENCES chats(id),
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'text',
        file_url TEXT,
        created_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS messages_chat ON messages(chat_id, created_at)",
];

pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    tracing::debug!(statements = SCHEMA.len(), "schema ready");
    Ok(())
}

/// Current time as stored in every `*_at` column.
pub fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

pub fn from_micros(micros: i64) -> Result<OffsetDateTime, ChatError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|e| ChatError::Remote(format!("bad timestamp {micros}: {e}")))
}
