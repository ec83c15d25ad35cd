use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::{ChatError, ValidationError},
    phone, profiles,
};

use super::{AuthSession, IdentityProvider};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const EMAIL_DOMAIN: &str = "messenger.app";

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpForm {
    /// ISO country code the phone number belongs to
    pub country: String,
    pub phone: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignUp {
    pub username: String,
    pub phone: String,
}

#[derive(Debug)]
pub struct SignUpOutcome {
    pub user_id: String,
    /// None when the automatic sign-in after registration failed
    pub session: Option<AuthSession>,
}

pub fn login_email(username: &str) -> String {
    format!("{username}@{EMAIL_DOMAIN}")
}

pub fn validate_sign_up(form: &SignUpForm) -> Result<ValidSignUp, ValidationError> {
    if form.password != form.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }

    let username = form.username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    if form.phone.trim().is_empty() {
        return Err(ValidationError::EmptyPhone);
    }

    let country = phone::find_country(&form.country)
        .ok_or_else(|| ValidationError::UnknownCountry(form.country.clone()))?;
    let phone = phone::normalize(&form.phone, country)?;

    Ok(ValidSignUp { username: username.to_owned(), phone })
}

pub async fn sign_up(
    db_pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    form: &SignUpForm,
) -> Result<SignUpOutcome, ChatError> {
    let ValidSignUp { username, phone } = validate_sign_up(form)?;

    let email = login_email(&username);
    if profiles::username_taken(db_pool, &username, None).await?
        || profiles::login_email_in_use(db_pool, &email).await?
    {
        return Err(ChatError::UsernameTaken);
    }

    let user_id = identity.sign_up(&email, &form.password).await?;
    if let Err(e) = profiles::create_profile(db_pool, &user_id, &username, &phone).await {
        tracing::warn!(%user_id, %email, error = %e, "provider account left without a profile");
        return Err(e);
    }

    let session = match identity.sign_in(&email, &form.password).await {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "automatic sign-in after sign up failed");
            None
        }
    };

    Ok(SignUpOutcome { user_id, session })
}

pub async fn sign_in(
    db_pool: &SqlitePool,
    identity: &dyn IdentityProvider,
    username: &str,
    password: &str,
) -> Result<AuthSession, ChatError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::EmptyUsername.into());
    }
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyPassword.into());
    }

    let Some(email) = profiles::login_email_of(db_pool, username).await? else {
        return Err(ChatError::UnknownUser);
    };

    identity.sign_in(&email, password).await
}

pub async fn sign_out(identity: &dyn IdentityProvider, session: &AuthSession) -> Result<(), ChatError> {
    identity.sign_out(&session.access_token).await
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::db;

    #[derive(Default)]
    struct MemoryIdentity {
        accounts: Mutex<HashMap<String, (String, String)>>,
        refuse_sign_in: bool,
    }

    #[async_trait]
    impl IdentityProvider for MemoryIdentity {
        async fn sign_up(&self, email: &str, password: &str) -> Result<String, ChatError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(ChatError::UsernameTaken);
            }
            let user_id = format!("id-{}", accounts.len() + 1);
            accounts.insert(email.to_owned(), (user_id.clone(), password.to_owned()));
            Ok(user_id)
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ChatError> {
            if self.refuse_sign_in {
                return Err(ChatError::Remote("unavailable".into()));
            }
            match self.accounts.lock().unwrap().get(email) {
                Some((user_id, stored)) if stored == password => Ok(AuthSession {
                    user_id: user_id.clone(),
                    access_token: format!("token-{user_id}"),
                }),
                _ => Err(ChatError::InvalidCredentials),
            }
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn form(username: &str, phone: &str, password: &str, confirm: &str) -> SignUpForm {
        SignUpForm {
            country: "RU".into(),
            phone: phone.into(),
            username: username.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    async fn pool() -> SqlitePool {
        let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
        db::migrate(&db_pool).await.unwrap();
        db_pool
    }

    #[test]
    fn validation_order() {
        assert_eq!(validate_sign_up(&form("", "", "abc", "abd")), Err(ValidationError::PasswordMismatch));
        assert_eq!(
            validate_sign_up(&form("", "", "abc", "abc")),
            Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN })
        );
        assert_eq!(validate_sign_up(&form("  ", "", "secret", "secret")), Err(ValidationError::EmptyUsername));
        assert_eq!(validate_sign_up(&form("neo", " ", "secret", "secret")), Err(ValidationError::EmptyPhone));
        assert!(matches!(
            validate_sign_up(&form("neo", "999 123", "secret", "secret")),
            Err(ValidationError::PhoneLength { country: "Russia", .. })
        ));

        let mut unknown = form("neo", "9991234567", "secret", "secret");
        unknown.country = "ZZ".into();
        assert_eq!(validate_sign_up(&unknown), Err(ValidationError::UnknownCountry("ZZ".into())));
    }

    #[test]
    fn stores_canonical_phone() {
        let valid = validate_sign_up(&form(" neo ", "999 123 45 67", "secret", "secret")).unwrap();
        assert_eq!(valid, ValidSignUp { username: "neo".into(), phone: "+79991234567".into() });
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let db_pool = pool().await;
        let identity = MemoryIdentity::default();

        let outcome = sign_up(&db_pool, &identity, &form("neo", "999 123 45 67", "secret", "secret")).await.unwrap();
        let session = outcome.session.unwrap();
        assert_eq!(session.user_id, outcome.user_id);

        let profile = profiles::get_profile(&db_pool, &outcome.user_id).await.unwrap().unwrap();
        assert_eq!(profile.username, "neo");
        assert_eq!(profile.phone, "+79991234567");
        assert_eq!(profile.theme, profiles::Theme::Light);

        let again = sign_in(&db_pool, &identity, "neo", "secret").await.unwrap();
        assert_eq!(again.user_id, outcome.user_id);

        assert!(matches!(sign_in(&db_pool, &identity, "neo", "wrong!").await, Err(ChatError::InvalidCredentials)));
        assert!(matches!(sign_in(&db_pool, &identity, "trinity", "secret").await, Err(ChatError::UnknownUser)));
        assert!(matches!(
            sign_in(&db_pool, &identity, "neo", " ").await,
            Err(ChatError::Validation(ValidationError::EmptyPassword))
        ));
    }

    #[tokio::test]
    async fn taken_username_never_reaches_provider() {
        let db_pool = pool().await;
        let identity = MemoryIdentity::default();
        sign_up(&db_pool, &identity, &form("neo", "9991234567", "secret", "secret")).await.unwrap();

        let err = sign_up(&db_pool, &identity, &form("neo", "9997654321", "secret", "secret")).await.unwrap_err();
        assert!(matches!(err, ChatError::UsernameTaken));
        assert_eq!(identity.accounts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn renamed_user_still_signs_in() {
        let db_pool = pool().await;
        let identity = MemoryIdentity::default();
        let outcome = sign_up(&db_pool, &identity, &form("neo", "9991234567", "secret", "secret")).await.unwrap();

        let update = profiles::ProfileUpdate { username: Some("morpheus".into()), theme: None };
        profiles::update_profile(&db_pool, &outcome.user_id, update).await.unwrap();

        let session = sign_in(&db_pool, &identity, "morpheus", "secret").await.unwrap();
        assert_eq!(session.user_id, outcome.user_id);
        assert!(matches!(sign_in(&db_pool, &identity, "neo", "secret").await, Err(ChatError::UnknownUser)));

        // the old name's provider login still belongs to the renamed account
        let err = sign_up(&db_pool, &identity, &form("neo", "9997654321", "secret", "secret")).await.unwrap_err();
        assert!(matches!(err, ChatError::UsernameTaken));
        assert_eq!(identity.accounts.lock().unwrap().len(), 1);
    }

    /// Provider that lets another profile claim the username while the account is created.
    struct ContendedIdentity {
        inner: MemoryIdentity,
        db_pool: SqlitePool,
    }

    #[async_trait]
    impl IdentityProvider for ContendedIdentity {
        async fn sign_up(&self, email: &str, password: &str) -> Result<String, ChatError> {
            let user_id = self.inner.sign_up(email, password).await?;
            profiles::create_profile(&self.db_pool, "rival", "neo", "+79990000000").await?;
            Ok(user_id)
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ChatError> {
            self.inner.sign_in(email, password).await
        }

        async fn sign_out(&self, access_token: &str) -> Result<(), ChatError> {
            self.inner.sign_out(access_token).await
        }
    }

    #[tokio::test]
    async fn username_race_after_provider_sign_up() {
        let db_pool = pool().await;
        let identity = ContendedIdentity { inner: MemoryIdentity::default(), db_pool: db_pool.clone() };

        let err = sign_up(&db_pool, &identity, &form("neo", "9991234567", "secret", "secret")).await.unwrap_err();
        assert!(matches!(err, ChatError::UsernameTaken));

        // the provider account exists but no profile points at it
        assert_eq!(identity.inner.accounts.lock().unwrap().len(), 1);
        assert!(profiles::get_profile(&db_pool, "id-1").await.unwrap().is_none());
        let owner = profiles::login_email_of(&db_pool, "neo").await.unwrap();
        assert_eq!(owner.as_deref(), Some("neo@messenger.app"));
    }

    #[tokio::test]
    async fn failed_auto_sign_in_keeps_account() {
        let db_pool = pool().await;
        let identity = MemoryIdentity { refuse_sign_in: true, ..Default::default() };

        let outcome = sign_up(&db_pool, &identity, &form("neo", "9991234567", "secret", "secret")).await.unwrap();
        assert!(outcome.session.is_none());
        assert!(profiles::get_profile(&db_pool, &outcome.user_id).await.unwrap().is_some());
    }
}
