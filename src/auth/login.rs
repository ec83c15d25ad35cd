use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;

use crate::{AppResult, AppState, session::AUTH};

use super::{IdentityProvider, SessionEvent, sign_in};

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(events): State<broadcast::Sender<SessionEvent>>,
    session: Session,
    Json(LoginForm { username, password }): Json<LoginForm>,
) -> AppResult<Json<Value>> {
    let auth = sign_in(&db_pool, identity.as_ref(), &username, &password).await?;
    let user_id = auth.user_id.clone();

    session.cycle_id().await?;
    session.insert(AUTH, auth).await?;
    let _ = events.send(SessionEvent::SignedIn { user_id: user_id.clone() });

    Ok(Json(json!({ "user_id": user_id })))
}
