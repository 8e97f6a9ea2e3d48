//! Session lifecycle: the state machine behind sign-up, sign-in, email
//! verification, password reset, and sign-out.
//!
//! Every mutating operation runs its pre-commit validator chain before the
//! store is touched. Token-creating transitions dispatch exactly one email;
//! delivery itself is fire-and-forget.

use sqlx::PgPool;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy::{self, CredentialInput, PolicyCheck, PolicyDecision};
use crate::auth::repo_types::{OneTimeToken, Session, TokenPurpose, User};
use crate::auth::session::{generate_token, hash_token, SessionPolicy};
use crate::mailer::{self, OutboundMail};
use crate::state::AppState;

pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct SignInInput {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

/// A freshly created session together with the raw token the cookie carries.
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

pub struct SignUpOutcome {
    pub user: User,
    pub verification_required: bool,
    pub session: Option<IssuedSession>,
}

pub struct VerifyOutcome {
    pub user: User,
    pub session: Option<IssuedSession>,
}

fn enforce(chain: &[PolicyCheck], input: &CredentialInput) -> Result<(), AuthError> {
    match policy::evaluate(chain, input) {
        PolicyDecision::Allow => Ok(()),
        PolicyDecision::Deny {
            rule,
            field,
            reason,
        } => {
            warn!(rule, field, "pre-commit validator denied request");
            Err(AuthError::denied(rule, field, reason))
        }
    }
}

pub async fn sign_up(state: &AppState, input: SignUpInput) -> Result<SignUpOutcome, AuthError> {
    let email = input.email.trim().to_lowercase();
    enforce(
        policy::SIGN_UP,
        &CredentialInput {
            name: Some(&input.name),
            email: Some(&email),
            password: Some(&input.password),
        },
    )?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "sign-up with registered email");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&input.password)?;
    let user = User::create(&state.db, &email, input.name.trim(), &hash).await?;

    send_verification(state, &user).await?;

    let verification_required = state.config.session.require_email_verification;
    let session = if verification_required {
        None
    } else {
        Some(open_session(state, &user, false).await?)
    };

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok(SignUpOutcome {
        user,
        verification_required,
        session,
    })
}

pub async fn sign_in(
    state: &AppState,
    input: SignInInput,
) -> Result<(User, IssuedSession), AuthError> {
    let email = input.email.trim().to_lowercase();
    enforce(
        policy::SIGN_IN,
        &CredentialInput {
            name: None,
            email: Some(&email),
            password: Some(&input.password),
        },
    )?;

    // Unknown email and wrong password must be indistinguishable to callers.
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "sign-in with unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(&input.password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    if state.config.session.require_email_verification && !user.email_verified {
        // Re-send the link so the user can complete the pending verification.
        send_verification(state, &user).await?;
        warn!(user_id = %user.id, "sign-in before verification");
        return Err(AuthError::VerificationRequired);
    }

    let issued = open_session(state, &user, input.remember).await?;
    info!(user_id = %user.id, "user signed in");
    Ok((user, issued))
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<VerifyOutcome, AuthError> {
    let Some(user_id) =
        OneTimeToken::redeem(&state.db, &hash_token(token), TokenPurpose::VerifyEmail).await?
    else {
        warn!("verification token rejected");
        return Err(AuthError::TokenInvalid);
    };

    User::mark_email_verified(&state.db, user_id).await?;
    let Some(user) = User::find_by_id(&state.db, user_id).await? else {
        return Err(AuthError::TokenInvalid);
    };

    let session = if state.config.session.auto_sign_in_after_verification {
        Some(open_session(state, &user, false).await?)
    } else {
        None
    };

    info!(user_id = %user.id, "email verified");
    Ok(VerifyOutcome { user, session })
}

/// Always succeeds from the caller's point of view so account existence is
/// not enumerable; the email goes out only when the account exists.
pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), AuthError> {
    let email = email.trim().to_lowercase();
    enforce(
        policy::FORGOT_PASSWORD,
        &CredentialInput {
            email: Some(&email),
            ..Default::default()
        },
    )?;

    match User::find_by_email(&state.db, &email).await? {
        Some(user) => {
            let ttl = Duration::hours(state.config.session.reset_token_ttl_hours);
            let token =
                issue_one_time_token(state, user.id, TokenPurpose::ResetPassword, ttl).await?;
            let url = reset_url(&state.config.public_base_url, &token);
            let (subject, html) = mailer::reset_email(&user.name, &user.email, &url);
            dispatch(
                state,
                OutboundMail {
                    to: user.email.clone(),
                    subject,
                    html,
                },
            );
            info!(user_id = %user.id, "password reset requested");
        }
        None => debug!(email = %email, "password reset for unknown email"),
    }
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    enforce(
        policy::RESET_PASSWORD,
        &CredentialInput {
            password: Some(new_password),
            ..Default::default()
        },
    )?;

    let Some(user_id) =
        OneTimeToken::redeem(&state.db, &hash_token(token), TokenPurpose::ResetPassword).await?
    else {
        warn!("reset token rejected");
        return Err(AuthError::TokenInvalid);
    };

    let hash = hash_password(new_password)?;
    User::set_password_hash(&state.db, user_id, &hash).await?;

    // A credential change orphans every open session for the user.
    let dropped = Session::delete_all_for_user(&state.db, user_id).await?;
    info!(user_id = %user_id, dropped_sessions = dropped, "password reset");
    Ok(())
}

pub async fn sign_out(state: &AppState, token: &str) -> Result<(), AuthError> {
    Session::delete_by_token_hash(&state.db, &hash_token(token)).await?;
    Ok(())
}

/// Resolve a raw cookie token to its session and owner. Called once per
/// request by the extractor; the result is threaded down from there.
pub async fn resolve_session(
    db: &PgPool,
    token: &str,
) -> anyhow::Result<Option<(Session, User)>> {
    let Some(session) = Session::find_active(db, &hash_token(token)).await? else {
        return Ok(None);
    };
    let Some(user) = User::find_by_id(db, session.user_id).await? else {
        return Ok(None);
    };
    Ok(Some((session, user)))
}

async fn open_session(
    state: &AppState,
    user: &User,
    remember: bool,
) -> Result<IssuedSession, AuthError> {
    let policy = SessionPolicy {
        ttl_days: state.config.session.ttl_days,
        remember_ttl_days: state.config.session.remember_ttl_days,
    };
    let token = generate_token();
    let now = OffsetDateTime::now_utc();
    let session = Session::create(
        &state.db,
        user.id,
        &hash_token(&token),
        remember,
        policy.expiry_at(now, remember),
    )
    .await?;
    Ok(IssuedSession { token, session })
}

async fn issue_one_time_token(
    state: &AppState,
    user_id: Uuid,
    purpose: TokenPurpose,
    ttl: Duration,
) -> Result<String, AuthError> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    OneTimeToken::issue(&state.db, user_id, purpose, &hash_token(&token), expires_at).await?;
    Ok(token)
}

async fn send_verification(state: &AppState, user: &User) -> Result<(), AuthError> {
    let ttl = Duration::hours(state.config.session.verify_token_ttl_hours);
    let token = issue_one_time_token(state, user.id, TokenPurpose::VerifyEmail, ttl).await?;
    let url = verify_url(&state.config.public_base_url, &token);
    let (subject, html) = mailer::verification_email(&user.name, &url);
    dispatch(
        state,
        OutboundMail {
            to: user.email.clone(),
            subject,
            html,
        },
    );
    Ok(())
}

// Fire-and-forget: delivery failures are logged for operators, never
// surfaced to the requester.
fn dispatch(state: &AppState, mail: OutboundMail) {
    let mailer = Arc::clone(&state.mailer);
    tokio::spawn(async move {
        if let Err(err) = mailer.send(mail).await {
            error!(error = %err, "email dispatch failed");
        }
    });
}

pub fn verify_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/auth/verify-email?token={token}",
        base_url.trim_end_matches('/')
    )
}

pub fn reset_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/auth/reset-password?token={token}",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_urls_embed_token_and_trim_trailing_slash() {
        assert_eq!(
            verify_url("https://app.example/", "tok1"),
            "https://app.example/auth/verify-email?token=tok1"
        );
        assert_eq!(
            reset_url("https://app.example", "tok2"),
            "https://app.example/auth/reset-password?token=tok2"
        );
    }

    #[test]
    fn weak_password_is_a_policy_error() {
        let err = enforce(
            policy::RESET_PASSWORD,
            &CredentialInput {
                password: Some("short"),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Policy {
                rule: "password-strength",
                ..
            }
        ));
        assert_eq!(err.to_string(), policy::PASSWORD_NOT_STRONG);
    }

    #[test]
    fn sign_up_chain_rejects_before_any_store_access() {
        // "Jo" and "short" never reach hashing or the database: enforce fails
        // on the name check first.
        let err = enforce(
            policy::SIGN_UP,
            &CredentialInput {
                name: Some("Jo"),
                email: Some("a@b.com"),
                password: Some("short"),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Validation { field: "name", .. }
        ));
    }
}
