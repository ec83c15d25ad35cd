use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::ChatError;

use super::AuthSession;

/// External identity provider. Owns credentials and access tokens; profiles live in our store.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers an account and returns its user id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, ChatError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ChatError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ChatError>;
}

trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, ChatError>;
    fn get_obj_field(&self, field: &str) -> Result<&Value, ChatError>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> Result<String, ChatError> {
        Ok(
            self.get(field)
            .ok_or_else(|| ChatError::Remote(format!("expected {field} in identity response")))?
            .as_str()
            .ok_or_else(|| ChatError::Remote(format!("expected {field} in identity response to be string")))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> Result<&Value, ChatError> {
        self.get(field)
        .ok_or_else(|| ChatError::Remote(format!("expected {field} in identity response")))
    }
}

fn error_message(body: &Value) -> String {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("identity provider error")
        .to_owned()
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// GoTrue-style REST identity API.
#[derive(Clone)]
pub struct HttpIdentity {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentity {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ChatError> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(HttpIdentity {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn read(response: reqwest::Response) -> Result<(StatusCode, Value), ChatError> {
        let status = response.status();
        let body = response.json().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, ChatError> {
        let response = self.http.post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;

        if !status.is_success() {
            let message = error_message(&body);
            if message.contains("already registered") {
                return Err(ChatError::UsernameTaken);
            }
            return Err(ChatError::Remote(format!("sign up rejected ({status}): {message}")));
        }

        // With auto-confirm on the user object is nested next to the tokens
        let user = body.get_obj_field("user").unwrap_or(&body);
        user.get_str_field("id")
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ChatError> {
        let response = self.http.post(self.url("token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let (status, body) = Self::read(response).await?;

        match status {
            s if s.is_success() => Ok(AuthSession {
                user_id: body.get_obj_field("user")?.get_str_field("id")?,
                access_token: body.get_str_field("access_token")?,
            }),
            StatusCode::BAD_REQUEST => Err(ChatError::InvalidCredentials),
            s => Err(ChatError::Remote(format!("sign in failed ({s}): {}", error_message(&body)))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ChatError> {
        let response = self.http.post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Remote(format!("sign out failed ({status})")));
        }
        Ok(())
    }
}
