mod account;
mod identity;
mod login;
mod logout;
mod signup;

pub use account::{
    EMAIL_DOMAIN, MIN_PASSWORD_LEN, SignUpForm, SignUpOutcome, ValidSignUp, login_email, sign_in, sign_out,
    sign_up, validate_sign_up,
};
pub use identity::{HttpIdentity, IdentityProvider};

use axum::{Router, routing::{get, post}};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_sessions::Session;

use crate::{AppResult, AppState, error::ChatError, session::AUTH};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
        .route("/countries", get(signup::countries))
        .route("/phone", post(signup::phone_preview))
}

/// Identity of the signed-in user, passed explicitly to every call that acts on their behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

pub async fn current_session(session: &Session) -> Result<Option<AuthSession>, tower_sessions::session::Error> {
    session.get::<AuthSession>(AUTH).await
}

pub async fn require_session(session: &Session) -> AppResult<AuthSession> {
    current_session(session)
        .await?
        .ok_or_else(|| ChatError::Unauthorized.into())
}

/// Logs session changes until every sender is gone.
pub async fn watch_sessions(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::SignedIn { user_id }) => tracing::info!(%user_id, "signed in"),
            Ok(SessionEvent::SignedOut { user_id }) => tracing::info!(%user_id, "signed out"),
            Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "session events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}
