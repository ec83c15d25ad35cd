/// Cookie-session key holding the serialized `auth::AuthSession`
pub const AUTH: &str = "auth";
