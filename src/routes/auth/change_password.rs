use axum::{extract::State, response::Response};
use tracing::info;

use super::session::AuthSession;
use crate::{
    db::user_repository::RepoError,
    errors::AppError,
    models::user::ChangePasswordPayload,
    responses::JsonResponse,
    routes::extract::JsonBody,
    state::AppState,
    utils::password::{hash_password, verify_password},
};

pub async fn handle_change_password(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    JsonBody(payload): JsonBody<ChangePasswordPayload>,
) -> Result<Response, AppError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::validation(
            "old password and new password are required",
        ));
    }

    let user = app_state
        .db
        .find_user_by_id(claims.user_id)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::Unauthorized("user not found"))?;

    if !verify_password(&payload.old_password, &user.password_hash).unwrap_or(false) {
        return Err(AppError::Unauthorized("invalid password"));
    }

    let password_hash = hash_password(&payload.new_password)
        .map_err(|e| AppError::internal("failed to hash password", e))?;

    app_state
        .db
        .update_user_password(user.id, &password_hash)
        .await
        .map_err(|e| match e {
            // Deleted between the lookup and the write.
            RepoError::NotFound => AppError::Unauthorized("user not found"),
            other => AppError::internal("failed to update password", other),
        })?;

    info!(user_id = %user.id, "password changed");
    Ok(JsonResponse::message("password changed successfully"))
}
