use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, warn};

use crate::auth::repo_types::{Role, Session, User};
use crate::auth::service::resolve_session;
use crate::auth::session::extract_session_token;
use crate::state::AppState;

pub const SIGN_IN_PATH: &str = "/auth/sign-in";

/// Session resolved from the cookie, once per request, and threaded to the
/// handler as this value. There is no cross-request session cache; the role
/// is always the store's word, never the client's.
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(&parts.headers) else {
            return Err(Redirect::to(SIGN_IN_PATH).into_response());
        };
        match resolve_session(&state.db, &token).await {
            Ok(Some((session, user))) => Ok(CurrentUser {
                user,
                session,
                token,
            }),
            Ok(None) => Err(Redirect::to(SIGN_IN_PATH).into_response()),
            Err(err) => {
                error!(error = %err, "session lookup failed");
                Err((
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
                    .into_response())
            }
        }
    }
}

/// Admin gate. A role mismatch is answered exactly like a missing session:
/// redirect to sign-in, no distinct forbidden page.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if current.user.role != Role::Admin {
            warn!(user_id = %current.user.id, "non-admin denied admin area");
            return Err(Redirect::to(SIGN_IN_PATH).into_response());
        }
        Ok(AdminUser(current.user))
    }
}
