use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use crate::{errors::AppError, routes::auth::session::AuthSession, state::AppState};

/// The caller's own record, read fresh from storage.
pub async fn handle_profile(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Result<Response, AppError> {
    let user = app_state
        .db
        .find_user_by_id(claims.user_id)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::NotFound("user not found"))?;

    Ok(Json(user).into_response())
}
