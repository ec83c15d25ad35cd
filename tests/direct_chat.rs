mod common;

use std::time::{Duration, Instant};

use common::{direct_chats_between, file_pool, insert_group, memory_pool, seed_users};
use messenger::{
    chats::{MAX_RESOLVE_ATTEMPTS, create_direct, direct_key, find_direct, participant_ids, resolve},
    db,
    error::ChatError,
};

#[tokio::test]
async fn same_chat_in_either_order() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2", "u3"]).await;

    let first = resolve(&db_pool, "u1", "u2").await.unwrap();
    assert_eq!(resolve(&db_pool, "u1", "u2").await.unwrap(), first);
    assert_eq!(resolve(&db_pool, "u2", "u1").await.unwrap(), first);

    let other = resolve(&db_pool, "u1", "u3").await.unwrap();
    assert_ne!(other, first);

    assert_eq!(direct_chats_between(&db_pool, "u1", "u2").await, 1);
    assert_eq!(direct_chats_between(&db_pool, "u1", "u3").await, 1);
}

#[tokio::test]
async fn creator_is_admin() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2"]).await;

    let chat_id = resolve(&db_pool, "u2", "u1").await.unwrap();

    let mut members = participant_ids(&db_pool, &chat_id).await.unwrap();
    members.sort();
    assert_eq!(members, ["u1", "u2"]);

    let roles: Vec<(String, String)> =
        sqlx::query_as("SELECT user_id, role FROM chat_participants WHERE chat_id=? ORDER BY user_id")
            .bind(&chat_id)
            .fetch_all(&db_pool)
            .await
            .unwrap();
    assert_eq!(roles, [("u1".to_owned(), "member".to_owned()), ("u2".to_owned(), "admin".to_owned())]);
}

#[tokio::test]
async fn self_chat_is_rejected() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1"]).await;

    let err = resolve(&db_pool, "u1", "u1").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidParticipant));

    // rejected before any store access
    db_pool.close().await;
    let err = resolve(&db_pool, "u1", "u1").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidParticipant));
}

#[tokio::test]
async fn unknown_counterpart() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1"]).await;

    let err = resolve(&db_pool, "u1", "ghost").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound));
}

#[tokio::test]
async fn group_chats_are_not_direct_matches() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2", "u3"]).await;
    insert_group(&db_pool, "g-pair", Some("just us"), &["u1", "u2"]).await;
    insert_group(&db_pool, "g-three", None, &["u1", "u2", "u3"]).await;

    assert_eq!(find_direct(&db_pool, "u1", "u2").await.unwrap(), None);

    let chat_id = resolve(&db_pool, "u1", "u2").await.unwrap();
    assert!(!chat_id.starts_with("g-"));
}

#[tokio::test]
async fn store_rejects_second_chat_for_pair() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2"]).await;

    let winner = create_direct(&db_pool, "u1", "u2").await.unwrap();

    let err = create_direct(&db_pool, "u2", "u1").await.unwrap_err();
    assert!(matches!(err, ChatError::DirectChatConflict));
    assert!(err.is_conflict());

    // the rejected attempt left nothing behind
    let (chats,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats").fetch_one(&db_pool).await.unwrap();
    assert_eq!(chats, 1);

    assert_eq!(resolve(&db_pool, "u2", "u1").await.unwrap(), winner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolves_converge() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2"]).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let db_pool = db_pool.clone();
        let (a, b) = if i % 2 == 0 { ("u1", "u2") } else { ("u2", "u1") };
        tasks.push(tokio::spawn(async move { resolve(&db_pool, a, b).await }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1, "resolvers disagreed: {ids:?}");
    assert_eq!(direct_chats_between(&db_pool, "u1", "u2").await, 1);
}

#[tokio::test]
async fn two_sessions_same_instant() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2"]).await;

    let (a, b) = tokio::join!(resolve(&db_pool, "u1", "u2"), resolve(&db_pool, "u2", "u1"));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(direct_chats_between(&db_pool, "u1", "u2").await, 1);
}

#[tokio::test]
async fn conflict_without_visible_chat_exhausts_rescans() {
    let db_pool = memory_pool().await;
    seed_users(&db_pool, &["u1", "u2"]).await;

    // the pair key is taken but the chat has no participants, so every create conflicts
    // and no rescan finds it
    let now = db::now_micros();
    sqlx::query("INSERT INTO chats (id,name,is_group,created_by,direct_key,created_at,updated_at) VALUES ('held',NULL,0,'u2',?,?,?)")
        .bind(direct_key("u1", "u2"))
        .bind(now)
        .bind(now)
        .execute(&db_pool)
        .await
        .unwrap();

    let started = Instant::now();
    let err = resolve(&db_pool, "u1", "u2").await.unwrap_err();
    assert!(matches!(err, ChatError::DirectChatConflict));
    // every attempt hit the conflict and waited at least 5ms before rescanning
    assert!(started.elapsed() >= Duration::from_millis(5 * MAX_RESOLVE_ATTEMPTS as u64));

    let (chats,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats").fetch_one(&db_pool).await.unwrap();
    assert_eq!(chats, 1);

    // once the held chat is complete the rescan finds it
    for user_id in ["u1", "u2"] {
        sqlx::query("INSERT INTO chat_participants (chat_id,user_id,role,joined_at) VALUES ('held',?,'member',?)")
            .bind(user_id)
            .bind(now)
            .execute(&db_pool)
            .await
            .unwrap();
    }
    assert_eq!(resolve(&db_pool, "u1", "u2").await.unwrap(), "held");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_resolves_converge_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let db_pool = file_pool(&dir, 8).await;
    let users: Vec<String> = (0..20).map(|i| format!("u{i:02}")).collect();
    let names: Vec<&str> = users.iter().map(String::as_str).collect();
    seed_users(&db_pool, &names).await;

    for round in 0..names.len() / 2 {
        let (a, b) = (users[2 * round].clone(), users[2 * round + 1].clone());

        let mut tasks = Vec::new();
        for i in 0..32 {
            let db_pool = db_pool.clone();
            let (self_id, other_id) = if i % 2 == 0 { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
            tasks.push(tokio::spawn(async move { resolve(&db_pool, &self_id, &other_id).await }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "round {round}: resolvers disagreed: {ids:?}");
        assert_eq!(direct_chats_between(&db_pool, &a, &b).await, 1);
    }

    let (chats,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats").fetch_one(&db_pool).await.unwrap();
    assert_eq!(chats, (names.len() / 2) as i64);
}
