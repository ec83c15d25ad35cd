//! Shared helpers for the integration tests.

use messenger::{auth::AuthSession, db, profiles};
use sqlx::SqlitePool;

/// Fresh in-memory database with the schema applied.
///
/// A single connection keeps every caller on the same in-memory database.
pub async fn memory_pool() -> SqlitePool {
    let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::migrate(&db_pool).await.unwrap();
    db_pool
}

/// Schema-ready pool over a database file in `dir`, shared by `max_connections` connections.
#[allow(dead_code)]
pub async fn file_pool(dir: &tempfile::TempDir, max_connections: u32) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("chat.db").display());
    let db_pool = db::connect(&url, max_connections).await.unwrap();
    db::migrate(&db_pool).await.unwrap();
    db_pool
}

/// Creates a profile per name, using the name as the user id.
pub async fn seed_users(db_pool: &SqlitePool, names: &[&str]) {
    for (i, name) in names.iter().enumerate() {
        profiles::create_profile(db_pool, name, name, &format!("+7999000{i:04}")).await.unwrap();
    }
}

#[allow(dead_code)]
pub fn session_for(user_id: &str) -> AuthSession {
    AuthSession { user_id: user_id.to_owned(), access_token: format!("token-{user_id}") }
}

/// Number of non-group chats whose participants are exactly `a` and `b`.
#[allow(dead_code)]
pub async fn direct_chats_between(db_pool: &SqlitePool, a: &str, b: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        r#"SELECT COUNT(*) FROM chats c
           WHERE c.is_group = 0
             AND (SELECT COUNT(*) FROM chat_participants WHERE chat_id = c.id) = 2
             AND EXISTS (SELECT 1 FROM chat_participants WHERE chat_id = c.id AND user_id = ?)
             AND EXISTS (SELECT 1 FROM chat_participants WHERE chat_id = c.id AND user_id = ?)"#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(db_pool)
    .await
    .unwrap();
    count
}

/// Inserts a group chat directly; group creation has no API of its own.
#[allow(dead_code)]
pub async fn insert_group(db_pool: &SqlitePool, id: &str, name: Option<&str>, members: &[&str]) {
    let now = db::now_micros();
    sqlx::query("INSERT INTO chats (id,name,is_group,created_by,direct_key,created_at,updated_at) VALUES (?,?,1,?,NULL,?,?)")
        .bind(id)
        .bind(name)
        .bind(members[0])
        .bind(now)
        .bind(now)
        .execute(db_pool)
        .await
        .unwrap();
    for member in members {
        sqlx::query("INSERT INTO chat_participants (chat_id,user_id,role,joined_at) VALUES (?,?,'member',?)")
            .bind(id)
            .bind(member)
            .bind(now)
            .execute(db_pool)
            .await
            .unwrap();
    }
}
