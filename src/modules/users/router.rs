use axum::{
    Router,
    routing::{get, patch, put},
};

use crate::state::AppState;

use super::controller::{assign_role, create_user, get_profile, list_users, set_user_status};

pub fn init_users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(get_profile))
        .route("/{id}/role", put(assign_role))
        .route("/{id}/status", patch(set_user_status))
}
