use thiserror::Error;

/// Input rejected before any remote call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("enter a username")]
    EmptyUsername,

    #[error("enter a password")]
    EmptyPassword,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("enter a phone number")]
    EmptyPhone,

    #[error("unknown country code {0}")]
    UnknownCountry(String),

    #[error("{country} numbers need {expected} digits")]
    PhoneLength { country: &'static str, expected: String },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("username already taken")]
    UsernameTaken,

    #[error("direct conversation was created concurrently")]
    DirectChatConflict,

    #[error("cannot start a conversation with yourself")]
    InvalidParticipant,

    #[error("message is empty")]
    EmptyMessage,

    #[error("wrong password")]
    InvalidCredentials,

    #[error("no user with that name")]
    UnknownUser,

    #[error("not a participant of this conversation")]
    NotParticipant,

    #[error("not found")]
    NotFound,

    #[error("not signed in")]
    Unauthorized,

    #[error("remote failure: {0}")]
    Remote(String),
}

impl ChatError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ChatError::UsernameTaken | ChatError::DirectChatConflict)
    }

    /// HTTP status used when the error reaches a handler
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::Validation(_) | ChatError::InvalidParticipant | ChatError::EmptyMessage => 400,
            ChatError::Unauthorized | ChatError::InvalidCredentials => 401,
            ChatError::NotParticipant => 403,
            ChatError::NotFound | ChatError::UnknownUser => 404,
            ChatError::UsernameTaken | ChatError::DirectChatConflict => 409,
            ChatError::Remote(_) => 502,
        }
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Remote(e.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Remote(e.to_string())
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
