use axum::{Json, debug_handler, extract::{Query, State}};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{AppResult, auth::require_session, error::ChatError};

use super::{ProfileUpdate, UserProfile, get_profile, update_profile};

#[debug_handler]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<UserProfile>> {
    let auth = require_session(&session).await?;
    let profile = get_profile(&db_pool, &auth.user_id).await?.ok_or(ChatError::NotFound)?;
    Ok(Json(profile))
}

#[debug_handler]
pub(crate) async fn update_me(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<UserProfile>> {
    let auth = require_session(&session).await?;
    Ok(Json(update_profile(&db_pool, &auth.user_id, update).await?))
}

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[debug_handler]
pub(crate) async fn search(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    let auth = require_session(&session).await?;
    Ok(Json(super::search(&db_pool, &q, &auth.user_id).await?))
}
