use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use super::token_pair;
use crate::{
    db::user_repository::RepoError,
    errors::AppError,
    models::user::{NewUser, RegisterPayload},
    routes::extract::JsonBody,
    state::AppState,
    utils::password::hash_password,
};

pub async fn handle_register(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<Response, AppError> {
    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation(
            "username, email, and password are required",
        ));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::internal("failed to hash password", e))?;

    let user = app_state
        .db
        .create_user(NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            role: app_state.config.default_registration_role.as_str(),
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::AlreadyExists("user already exists"),
            other => AppError::internal("failed to create user", other),
        })?;

    info!(user_id = %user.id, role = %user.role, "user registered");
    let body = token_pair(user, &app_state.jwt_keys)?;
    Ok((StatusCode::CREATED, Json(body)).into_response())
}
