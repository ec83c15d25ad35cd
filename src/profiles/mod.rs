mod directory;
mod page;

pub use directory::{SEARCH_LIMIT, search};

use std::str::FromStr;

use axum::{Router, routing::get};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    AppState, auth, db,
    error::{ChatError, ValidationError, is_unique_violation},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(page::me).patch(page::update_me))
        .route("/search", get(page::search))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ChatError::Remote(format!("unknown theme {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    /// Canonical form, dial prefix followed by digits
    pub phone: String,
    pub theme: Theme,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProfileRow {
    id: String,
    username: String,
    phone: String,
    theme: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = ChatError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: row.id,
            username: row.username,
            phone: row.phone,
            theme: row.theme.parse()?,
            created_at: db::from_micros(row.created_at)?,
            updated_at: db::from_micros(row.updated_at)?,
        })
    }
}

pub(crate) const PROFILE_COLUMNS: &str = "id,username,phone,theme,created_at,updated_at";

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub theme: Option<Theme>,
}

/// Creates the profile of a freshly registered user.
///
/// The provider login is derived from the username given here and kept for good; later
/// renames do not change it.
pub async fn create_profile(
    db_pool: &SqlitePool,
    user_id: &str,
    username: &str,
    phone: &str,
) -> Result<(), ChatError> {
    let now = db::now_micros();
    sqlx::query(
        "INSERT INTO user_profiles (id,username,username_lower,login_email,phone,theme,created_at,updated_at) VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(user_id)
    .bind(username)
    .bind(username.to_lowercase())
    .bind(auth::login_email(username))
    .bind(phone)
    .bind(Theme::default().as_str())
    .bind(now)
    .bind(now)
    .execute(db_pool)
    .await
    .map_err(|e| if is_unique_violation(&e) { ChatError::UsernameTaken } else { e.into() })?;

    tracing::info!(%user_id, %username, "profile created");
    Ok(())
}

pub async fn get_profile(db_pool: &SqlitePool, user_id: &str) -> Result<Option<UserProfile>, ChatError> {
    let row: Option<ProfileRow> = sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id=?"))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    row.map(UserProfile::try_from).transpose()
}

/// Provider login of the account currently named `username`.
pub async fn login_email_of(db_pool: &SqlitePool, username: &str) -> Result<Option<String>, ChatError> {
    let email: Option<(String,)> = sqlx::query_as("SELECT login_email FROM user_profiles WHERE username=?")
        .bind(username)
        .fetch_optional(db_pool)
        .await?;
    Ok(email.map(|(email,)| email))
}

/// True if some account, possibly renamed since, registered with `email`.
pub async fn login_email_in_use(db_pool: &SqlitePool, email: &str) -> Result<bool, ChatError> {
    let used = sqlx::query("SELECT 1 FROM user_profiles WHERE login_email=?")
        .bind(email)
        .fetch_optional(db_pool)
        .await?
        .is_some();
    Ok(used)
}

/// True if `username` belongs to anyone other than `except`.
pub async fn username_taken(db_pool: &SqlitePool, username: &str, except: Option<&str>) -> Result<bool, ChatError> {
    let taken = sqlx::query("SELECT 1 FROM user_profiles WHERE username=? AND id<>?")
        .bind(username)
        .bind(except.unwrap_or(""))
        .fetch_optional(db_pool)
        .await?
        .is_some();
    Ok(taken)
}

pub async fn update_profile(
    db_pool: &SqlitePool,
    user_id: &str,
    ProfileUpdate { username, theme }: ProfileUpdate,
) -> Result<UserProfile, ChatError> {
    let current = get_profile(db_pool, user_id).await?.ok_or(ChatError::NotFound)?;

    let username = match username {
        Some(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyUsername.into());
            }
            if name != current.username && username_taken(db_pool, name, Some(user_id)).await? {
                return Err(ChatError::UsernameTaken);
            }
            name.to_owned()
        }
        None => current.username,
    };
    let theme = theme.unwrap_or(current.theme);

    sqlx::query("UPDATE user_profiles SET username=?, username_lower=?, theme=?, updated_at=? WHERE id=?")
        .bind(&username)
        .bind(username.to_lowercase())
        .bind(theme.as_str())
        .bind(db::now_micros())
        .bind(user_id)
        .execute(db_pool)
        .await
        .map_err(|e| if is_unique_violation(&e) { ChatError::UsernameTaken } else { e.into() })?;

    get_profile(db_pool, user_id).await?.ok_or(ChatError::NotFound)
}
