use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    error::ValidationError,
    phone::{self, COUNTRIES, Country},
    session::AUTH,
};

use super::{IdentityProvider, SessionEvent, SignUpForm, SignUpOutcome, sign_up};

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(events): State<broadcast::Sender<SessionEvent>>,
    session: Session,
    Json(form): Json<SignUpForm>,
) -> AppResult<Json<Value>> {
    let SignUpOutcome { user_id, session: auth } = sign_up(&db_pool, identity.as_ref(), &form).await?;

    let signed_in = auth.is_some();
    if let Some(auth) = auth {
        session.cycle_id().await?;
        session.insert(AUTH, auth).await?;
        let _ = events.send(SessionEvent::SignedIn { user_id: user_id.clone() });
    }

    Ok(Json(json!({ "user_id": user_id, "signed_in": signed_in })))
}

#[debug_handler]
pub(crate) async fn countries() -> Json<&'static [Country]> {
    Json(COUNTRIES)
}

#[derive(Deserialize)]
pub(crate) struct PhoneQuery {
    country: String,
    phone: String,
}

#[derive(Serialize)]
pub(crate) struct PhonePreview {
    formatted: String,
    valid: bool,
    canonical: String,
}

/// Formatting feedback while the number is being typed.
#[debug_handler]
pub(crate) async fn phone_preview(
    Json(PhoneQuery { country, phone: raw }): Json<PhoneQuery>,
) -> AppResult<Json<PhonePreview>> {
    let country = phone::find_country(&country).ok_or(ValidationError::UnknownCountry(country))?;

    Ok(Json(PhonePreview {
        formatted: phone::format(&raw, country),
        valid: phone::validate(&raw, country),
        canonical: phone::to_canonical(&raw, country),
    }))
}
