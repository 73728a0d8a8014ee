pub mod admin;
pub mod auth;
pub mod extract;
pub mod health;
pub mod profile;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use auth::{
    handle_change_password, handle_login, handle_refresh, handle_register,
    session::require_access_token,
};

/// Every endpoint of the service. Transport layers (tracing, CORS, rate
/// limiting) are added by the binary.
pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/profile", get(profile::handle_profile))
        .route("/change-password", post(handle_change_password))
        .route_layer(from_fn_with_state(
            state.jwt_keys.clone(),
            require_access_token,
        ));

    Router::new()
        .route("/health", get(health::handle_health))
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .route("/refresh", post(handle_refresh))
        .merge(authenticated)
        .merge(admin::router(&state))
        .with_state(state)
}
