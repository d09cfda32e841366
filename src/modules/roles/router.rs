use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

use super::controller::{
    assign_permissions, check_permission, clone_role, create_role, delete_role,
    get_deletion_safety, get_highest_scope, get_permissions_by_module, get_role, get_role_users,
    list_roles, remove_permission, update_role,
};

pub fn init_roles_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/{id}", get(get_role).put(update_role).delete(delete_role))
        .route("/{id}/deletion-safety", get(get_deletion_safety))
        .route("/{id}/clone", post(clone_role))
        .route("/{id}/users", get(get_role_users))
        // Permission set and checks
        .route("/{id}/permissions", put(assign_permissions))
        .route("/{id}/permissions/by-module", get(get_permissions_by_module))
        .route(
            "/{id}/permissions/{permission_id}",
            delete(remove_permission),
        )
        .route("/{id}/highest-scope", get(get_highest_scope))
        .route("/{id}/check", get(check_permission))
}
