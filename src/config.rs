use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub identity_url: String,
    pub identity_api_key: String,
    pub session_minutes: i64,
    pub cors_origin: String,
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: var_or("DATABASE_URL", "sqlite://messenger.db"),
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", "8")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            identity_url: dotenv::var("IDENTITY_URL").context("IDENTITY_URL is required")?,
            identity_api_key: dotenv::var("IDENTITY_API_KEY").context("IDENTITY_API_KEY is required")?,
            session_minutes: var_or("SESSION_MINUTES", "60")
                .parse()
                .context("SESSION_MINUTES must be a number")?,
            cors_origin: var_or("CORS_ORIGIN", "http://localhost:5173"),
        })
    }
}
