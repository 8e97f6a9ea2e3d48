use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, MessageResponse, PublicUser, ResetPasswordRequest,
            SessionResponse, SignInRequest, SignUpRequest, SignUpResponse, VerifyEmailQuery,
        },
        error::AuthError,
        extractors::CurrentUser,
        service::{self, IssuedSession, SignInInput, SignUpInput},
        session::{clear_session_cookie, extract_session_token, session_cookie},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/session", get(session))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

fn set_cookie(headers: &mut HeaderMap, issued: &IssuedSession) -> Result<(), AuthError> {
    let max_age = issued.session.expires_at - issued.session.created_at;
    let value = session_cookie(&issued.token, max_age)
        .map_err(|err| AuthError::Internal(err.into()))?;
    headers.insert(SET_COOKIE, value);
    Ok(())
}

#[instrument(skip(state, payload))]
async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let outcome = service::sign_up(
        &state,
        SignUpInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
        },
    )
    .await?;

    let mut headers = HeaderMap::new();
    if let Some(issued) = &outcome.session {
        set_cookie(&mut headers, issued)?;
    }
    let body = SignUpResponse {
        user: PublicUser::from(&outcome.user),
        verification_required: outcome.verification_required,
    };
    Ok((StatusCode::CREATED, headers, Json(body)))
}

#[instrument(skip(state, payload))]
async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let (user, issued) = service::sign_in(
        &state,
        SignInInput {
            email: payload.email,
            password: payload.password,
            remember: payload.remember,
        },
    )
    .await?;

    let mut headers = HeaderMap::new();
    set_cookie(&mut headers, &issued)?;
    let body = SessionResponse {
        user: PublicUser::from(&user),
        expires_at: issued.session.expires_at,
    };
    Ok((StatusCode::OK, headers, Json(body)))
}

#[instrument(skip(state, headers))]
async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    if let Some(token) = extract_session_token(&headers) {
        service::sign_out(&state, &token).await?;
    }
    // The cookie is cleared even when no session row existed.
    let mut out = HeaderMap::new();
    out.insert(SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, out))
}

#[instrument(skip(state, query))]
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let outcome = service::verify_email(&state, &query.token).await?;
    let mut headers = HeaderMap::new();
    if let Some(issued) = &outcome.session {
        set_cookie(&mut headers, issued)?;
    }
    Ok((headers, Redirect::to("/email-verified")))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    service::forgot_password(&state, &payload.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If that account exists, a reset link is on its way",
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    service::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated; sign in with your new password",
        }),
    ))
}

/// Cookie-based session introspection. Absent or expired sessions answer
/// 204 rather than an error so auth state is not leaked.
#[instrument(skip(state, headers))]
async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let Some(token) = extract_session_token(&headers) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    match service::resolve_session(&state.db, &token).await? {
        Some((session, user)) => {
            let body = SessionResponse {
                user: PublicUser::from(&user),
                expires_at: session.expires_at,
            };
            Ok((StatusCode::OK, Json(body)).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[instrument(skip(current))]
async fn me(current: CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&current.user))
}
