use sqlx::SqlitePool;

use crate::error::ChatError;

use super::{PROFILE_COLUMNS, ProfileRow, UserProfile};

pub const SEARCH_LIMIT: u32 = 20;

fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring search on usernames, never returning `exclude_id`.
///
/// Matching runs on the Unicode-lowercased handle, so non-ASCII names fold too. A blank
/// query returns nothing without touching the database.
pub async fn search(db_pool: &SqlitePool, query: &str, exclude_id: &str) -> Result<Vec<UserProfile>, ChatError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
        r"SELECT {PROFILE_COLUMNS} FROM user_profiles
          WHERE username_lower LIKE ? ESCAPE '\' AND id<>?
          ORDER BY username_lower, username
          LIMIT ?"
    ))
    .bind(like_pattern(&query.to_lowercase()))
    .bind(exclude_id)
    .bind(SEARCH_LIMIT)
    .fetch_all(db_pool)
    .await?;

    tracing::debug!(%query, hits = rows.len(), "user search");
    rows.into_iter().map(UserProfile::try_from).collect()
}
