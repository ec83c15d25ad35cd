pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod phone;
pub mod profiles;
pub mod session;

use std::sync::Arc;

use axum::{Json, Router, extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::error::ChatError;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub identity: Arc<dyn auth::IdentityProvider>,
    pub chat_events: broadcast::Sender<chats::ChatEvent>,
    pub session_events: broadcast::Sender<auth::SessionEvent>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, identity: Arc<dyn auth::IdentityProvider>) -> Self {
        AppState {
            db_pool,
            identity,
            chat_events: broadcast::channel(256).0,
            session_events: broadcast::channel(64).0,
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .nest("/p", profiles::router())
        .nest("/c", chats::router())
        .with_state(app_state)
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::Remote(detail)) => {
                tracing::error!(%detail, "remote call failed");
                (StatusCode::BAD_GATEWAY, "something went wrong, try again".to_owned())
            }
            Some(e) => (
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
                e.to_string(),
            ),
            None => {
                tracing::error!(error = ?self.0, "unhandled error");
                (StatusCode::INTERNAL_SERVER_ERROR, "something went wrong, try again".to_owned())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(ChatError);
apperr_impl!(tower_sessions::session::Error);

impl From<error::ValidationError> for AppError {
    fn from(err: error::ValidationError) -> Self {
        ChatError::from(err).into()
    }
}
