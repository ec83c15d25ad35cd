use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use messenger::{AppState, auth, config::Config, db, logging, router};
use tower_http::cors::CorsLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let config = Config::from_env()?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>().context("CORS_ORIGIN is not a valid origin")?)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let db_pool = db::connect(&config.database_url, config.database_max_connections)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    db::migrate(&db_pool).await.context("applying schema")?;

    let identity = auth::HttpIdentity::new(&config.identity_url, &config.identity_api_key)?;
    let app_state = AppState::new(db_pool, Arc::new(identity));
    tokio::spawn(auth::watch_sessions(app_state.session_events.subscribe()));

    let app = router(app_state)
        .layer(session_layer)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
