pub mod users;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::routes::auth::{
    role_gate::{require_role, RequiredRole},
    session::require_access_token,
};
use crate::state::AppState;

/// Admin user management. Callers need an access token carrying the
/// privileged role.
pub fn router(state: &AppState) -> Router<AppState> {
    let required = RequiredRole(state.config.privileged_role().clone());

    Router::new()
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/get/{id}", get(users::get_user))
        .route("/admin/users/create", post(users::create_user))
        .route("/admin/users/update/{id}", patch(users::update_user))
        .route("/admin/users/delete/{id}", delete(users::delete_user))
        .route("/admin/users/role/{id}", put(users::update_user_role))
        // Last added runs first: authenticate, then check the role.
        .route_layer(from_fn_with_state(required, require_role))
        .route_layer(from_fn_with_state(
            state.jwt_keys.clone(),
            require_access_token,
        ))
}
