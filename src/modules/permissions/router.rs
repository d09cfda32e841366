use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

use super::controller::{
    create_permission, get_permission, get_permissions_by_module, list_modules, list_permissions,
    repair_permission_names, set_permission_status, update_permission,
};

pub fn init_permissions_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_permissions).post(create_permission))
        .route("/modules", get(list_modules))
        .route("/by-module", get(get_permissions_by_module))
        .route("/repair-names", post(repair_permission_names))
        .route("/{id}", get(get_permission).put(update_permission))
        .route("/{id}/status", patch(set_permission_status))
}
