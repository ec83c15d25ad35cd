use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode};
use tokio::sync::broadcast;
use tower_sessions::Session;

use crate::{AppResult, AppState};

use super::{IdentityProvider, SessionEvent, current_session, sign_out};

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(events): State<broadcast::Sender<SessionEvent>>,
    session: Session,
) -> AppResult<StatusCode> {
    if let Some(auth) = current_session(&session).await? {
        // the local session goes away even if the provider is unreachable
        if let Err(e) = sign_out(identity.as_ref(), &auth).await {
            tracing::warn!(user_id = %auth.user_id, error = %e, "provider sign out failed");
        }
        let _ = events.send(SessionEvent::SignedOut { user_id: auth.user_id });
    }

    session.clear().await;
    Ok(StatusCode::NO_CONTENT)
}
