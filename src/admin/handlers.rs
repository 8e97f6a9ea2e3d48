use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        dto::PublicUser,
        error::AuthError,
        extractors::AdminUser,
        repo_types::{Role, User},
    },
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct AdminOverview {
    pub signed_in_as: PublicUser,
    pub user_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

#[instrument(skip(state, admin))]
pub async fn overview(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<AdminOverview>, AuthError> {
    let user_count = User::count(&state.db).await?;
    Ok(Json(AdminOverview {
        signed_in_as: PublicUser::from(&admin),
        user_count,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = User::list(&state.db).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// The privileged role-assignment path; roles change nowhere else.
#[instrument(skip(state, admin, payload))]
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<RoleUpdateRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let Some(user) = User::set_role(&state.db, user_id, payload.role).await? else {
        return Err(AuthError::NotFound);
    };
    info!(admin_id = %admin.id, user_id = %user.id, role = ?payload.role, "role updated");
    Ok(Json(PublicUser::from(&user)))
}
