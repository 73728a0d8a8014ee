use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use super::token_pair;
use crate::{
    errors::AppError, models::user::LoginPayload, routes::extract::JsonBody, state::AppState,
    utils::password::verify_password,
};

pub async fn handle_login(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<Response, AppError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let user = app_state
        .db
        .find_user_by_email(&payload.email)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::InvalidCredentials)?;

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(AppError::InvalidCredentials),
        Err(e) => {
            // Unreadable stored hash; refuse the login without revealing it.
            warn!(user_id = %user.id, error = %e, "stored password hash could not be parsed");
            return Err(AppError::InvalidCredentials);
        }
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(token_pair(user, &app_state.jwt_keys)?).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use time::OffsetDateTime;

    use crate::db::mock_db::MockDb;
    use crate::routes::{auth::claims::TokenType, router};
    use crate::state::test_support::{make_user, send, test_state};
    use crate::utils::jwt::verify_token;

    #[tokio::test]
    async fn correct_credentials_issue_both_tokens() {
        let user = make_user("jane", "jane@example.com", "hunter22", "User");
        let state = test_state(Arc::new(MockDb::with_users(vec![user.clone()])));
        let keys = state.jwt_keys.clone();

        let (status, body) = send(
            router(state),
            "POST",
            "/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "hunter22"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let access = verify_token(body["access_token"].as_str().unwrap(), &keys).unwrap();
        let refresh = verify_token(body["refresh_token"].as_str().unwrap(), &keys).unwrap();
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(access.user_id, user.id);
        assert!(refresh.exp > access.exp);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_alike() {
        let user = make_user("jane", "jane@example.com", "hunter22", "User");
        let state = test_state(Arc::new(MockDb::with_users(vec![user])));
        let app = router(state);

        let wrong_password = json!({"email": "jane@example.com", "password": "nope"});
        let unknown = json!({"email": "ghost@example.com", "password": "hunter22"});

        let a = send(app.clone(), "POST", "/login", None, Some(wrong_password)).await;
        let b = send(app, "POST", "/login", None, Some(unknown)).await;
        assert_eq!(a.0, StatusCode::UNAUTHORIZED);
        assert_eq!(a, b);
        assert_eq!(a.1["error"], "invalid credentials");
    }

    #[tokio::test]
    async fn soft_deleted_user_cannot_log_in() {
        let mut user = make_user("jane", "jane@example.com", "hunter22", "User");
        user.deleted_at = Some(OffsetDateTime::now_utc());
        let state = test_state(Arc::new(MockDb::with_users(vec![user])));

        let (status, body) = send(
            router(state),
            "POST",
            "/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid credentials");
    }

    #[tokio::test]
    async fn blank_fields_and_db_failures() {
        let state = test_state(Arc::new(MockDb::new()));
        let (status, body) = send(
            router(state),
            "POST",
            "/login",
            None,
            Some(json!({"email": "jane@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "email and password are required");

        let state = test_state(Arc::new(MockDb::failing()));
        let (status, body) = send(
            router(state),
            "POST",
            "/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "failed to get user");
    }
}
