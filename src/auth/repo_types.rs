use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Coarse-grained authorization label. Assigned as `user` on sign-up and
/// changed only through the admin role-assignment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // stored lowercased, unique case-insensitively
    pub name: String,
    pub image: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    pub email_verified: bool,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

/// Server-side session row. The cookie carries the raw token; only its hash
/// is stored here.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub remember: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Purpose tag binding a one-time token to exactly one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "token_purpose", rename_all = "kebab-case")]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

/// Single-use, time-bounded token. Consumed at most once: `consumed_at` is
/// set by a conditional update, after which the row is inert.
#[derive(Debug, Clone, FromRow)]
pub struct OneTimeToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}
