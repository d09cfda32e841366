use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

use super::controller::{
    cache_stats, clear_cache, create_parameter, delete_parameter, get_by_category, get_by_key,
    get_parameter, get_value, list_categories, list_parameters, set_value, set_values,
    update_parameter, validate_value,
};

pub fn init_system_parameters_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_parameters).post(create_parameter))
        .route("/categories", get(list_categories))
        .route("/category/{category}", get(get_by_category))
        .route("/key/{key}", get(get_by_key))
        .route("/key/{key}/value", get(get_value).put(set_value))
        .route("/values", put(set_values))
        .route("/validate", post(validate_value))
        .route("/cache", get(cache_stats).delete(clear_cache))
        .route(
            "/{id}",
            get(get_parameter)
                .put(update_parameter)
                .delete(delete_parameter),
        )
}
