use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::overview))
        .route("/admin/users", get(handlers::list_users))
        .route("/admin/users/:id/role", post(handlers::set_role))
}
