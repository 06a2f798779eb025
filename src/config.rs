use anyhow::Context;

/// Application configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cors_allow_origin: String,
    pub jwt_secret: String,
    pub google: GoogleOAuthConfig,
}

/// Static app-level Google OAuth identity.
///
/// Safe to share process-wide: it never holds per-user token state. Anything
/// that accumulates a live token set (the refresh session) is constructed per
/// call instead.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            host: env_or("HOST", "0.0.0.0"),
            port: env_or("PORT", "8080")
                .parse()
                .context("PORT must be a number")?,
            database_url: required_env("DATABASE_URL")?,
            cors_allow_origin: env_or("CORS_ALLOW_ORIGIN", "*"),
            jwt_secret: required_env("JWT_SECRET")?,
            google: GoogleOAuthConfig {
                client_id: required_env("GOOGLE_CLIENT_ID")?,
                client_secret: required_env("GOOGLE_CLIENT_SECRET")?,
                redirect_uri: required_env("GOOGLE_REDIRECT_URI")?,
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                    "https://www.googleapis.com/auth/calendar".to_string(),
                ],
                authorize_url: env_or(
                    "GOOGLE_AUTHORIZE_URL",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                ),
                token_url: env_or("GOOGLE_TOKEN_URL", "https://oauth2.googleapis.com/token"),
            },
        })
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
