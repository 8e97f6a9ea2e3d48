use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{OneTimeToken, Role, Session, TokenPurpose, User};

const USER_COLUMNS: &str =
    "id, email, name, image, password_hash, email_verified, role, created_at";

impl User {
    /// Find a user by email, case-insensitively.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new, unverified user with the default role.
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, password_hash)
             VALUES (LOWER($1), $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn mark_email_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET email_verified = true WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn set_password_hash(db: &PgPool, id: Uuid, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Privileged role assignment; the only path that changes a role.
    pub async fn set_role(db: &PgPool, id: Uuid, role: Role) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

impl Session {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        token_hash: &str,
        remember: bool,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, remember, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token_hash, remember, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(remember)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(session)
    }

    /// Unexpired session for the hash, if any. The FK cascade guarantees the
    /// owning user still exists while the row does.
    pub async fn find_active(db: &PgPool, token_hash: &str) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, remember, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(session)
    }

    pub async fn delete_by_token_hash(db: &PgPool, token_hash: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Drop every session a user holds; used when the credential changes.
    pub async fn delete_all_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(db: &PgPool) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

impl OneTimeToken {
    /// Issue a fresh token, retiring any still-pending token of the same
    /// purpose so only the latest emailed link works.
    pub async fn issue(
        db: &PgPool,
        user_id: Uuid,
        purpose: TokenPurpose,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<OneTimeToken> {
        sqlx::query(
            r#"
            UPDATE one_time_tokens
            SET consumed_at = now()
            WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .execute(db)
        .await?;

        let token = sqlx::query_as::<_, OneTimeToken>(
            r#"
            INSERT INTO one_time_tokens (user_id, purpose, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, purpose, token_hash, created_at, expires_at, consumed_at
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(token)
    }

    /// Compare-and-invalidate redemption. The conditional update consumes the
    /// token and returns its owner in one statement, so two concurrent
    /// redemptions resolve to exactly one success.
    pub async fn redeem(
        db: &PgPool,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> anyhow::Result<Option<Uuid>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE one_time_tokens
            SET consumed_at = now()
            WHERE token_hash = $1
              AND purpose = $2
              AND consumed_at IS NULL
              AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(purpose)
        .fetch_optional(db)
        .await?;
        Ok(user_id)
    }
}
