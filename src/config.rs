use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_key: String,
    pub sender_name: String,
    pub sender_address: String,
}

/// Session and token policy knobs. Defaults follow the product defaults:
/// 30-day sessions, verification required before sign-in, auto sign-in once
/// the verification link is visited.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub remember_ttl_days: i64,
    pub require_email_verification: bool,
    pub auto_sign_in_after_verification: bool,
    pub verify_token_ttl_hours: i64,
    pub reset_token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub public_base_url: String,
    pub mail: MailConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Missing required values are a startup failure, never a runtime one.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").context("PUBLIC_BASE_URL must be set")?;
        let mail = MailConfig {
            api_key: std::env::var("RESEND_API_KEY").context("RESEND_API_KEY must be set")?,
            sender_name: std::env::var("EMAIL_SENDER_NAME")
                .context("EMAIL_SENDER_NAME must be set")?,
            sender_address: std::env::var("EMAIL_SENDER_ADDRESS")
                .context("EMAIL_SENDER_ADDRESS must be set")?,
        };
        let session = SessionConfig {
            ttl_days: env_i64("SESSION_TTL_DAYS", 30),
            remember_ttl_days: env_i64("SESSION_REMEMBER_TTL_DAYS", 60),
            require_email_verification: env_bool("REQUIRE_EMAIL_VERIFICATION", true),
            auto_sign_in_after_verification: env_bool("AUTO_SIGN_IN_AFTER_VERIFICATION", true),
            verify_token_ttl_hours: env_i64("VERIFY_TOKEN_TTL_HOURS", 24),
            reset_token_ttl_hours: env_i64("RESET_TOKEN_TTL_HOURS", 1),
        };
        Ok(Self {
            database_url,
            public_base_url,
            mail,
            session,
        })
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
