use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use super::{claims::TokenType, sign};
use crate::{
    errors::AppError,
    models::user::{RefreshPayload, RefreshResponse},
    routes::extract::JsonBody,
    state::AppState,
    utils::jwt::{verify_token, TokenError},
};

/// Exchanges a refresh token for a new access token. The refresh token itself
/// is not rotated.
pub async fn handle_refresh(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshPayload>,
) -> Result<Response, AppError> {
    if payload.refresh_token.is_empty() {
        return Err(AppError::validation("refresh token is required"));
    }

    let claims =
        verify_token(&payload.refresh_token, &app_state.jwt_keys).map_err(|e| match e {
            TokenError::Expired => AppError::ExpiredToken("refresh token expired"),
            TokenError::Invalid => AppError::InvalidToken("invalid refresh token"),
        })?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::InvalidToken("invalid token type"));
    }

    // Deleted users cannot refresh; the new token carries the stored role.
    let user = app_state
        .db
        .find_user_by_id(claims.user_id)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::Unauthorized("user not found"))?;

    let access_token = sign(&user, TokenType::Access, &app_state.jwt_keys)?;
    Ok(Json(RefreshResponse { access_token }).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use time::OffsetDateTime;

    use crate::db::mock_db::MockDb;
    use crate::routes::{
        auth::claims::{Claims, TokenType},
        router,
    };
    use crate::state::test_support::{make_user, send, test_state, token_for};
    use crate::utils::jwt::{encode_claims, verify_token};

    #[tokio::test]
    async fn refresh_issues_access_token_with_current_role() {
        let mut user = make_user("jane", "jane@example.com", "hunter22", "User");
        let state = test_state(Arc::new(MockDb::new()));
        let refresh = token_for(&state, &user, TokenType::Refresh);

        // Role changed after the refresh token was issued.
        user.role = "Super Admin".into();
        let state = test_state(Arc::new(MockDb::with_users(vec![user.clone()])));
        let keys = state.jwt_keys.clone();

        let (status, body) = send(
            router(state),
            "POST",
            "/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("refresh_token").is_none());
        let access = verify_token(body["access_token"].as_str().unwrap(), &keys).unwrap();
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.role, "Super Admin");
        assert_eq!(access.user_id, user.id);
    }

    #[tokio::test]
    async fn access_token_is_not_accepted_for_refresh() {
        let user = make_user("jane", "jane@example.com", "hunter22", "User");
        let state = test_state(Arc::new(MockDb::with_users(vec![user.clone()])));
        let access = token_for(&state, &user, TokenType::Access);

        let (status, body) = send(
            router(state),
            "POST",
            "/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token type");
    }

    #[tokio::test]
    async fn expired_garbage_and_empty_tokens() {
        let user = make_user("jane", "jane@example.com", "hunter22", "User");
        let state = test_state(Arc::new(MockDb::with_users(vec![user.clone()])));
        let app = router(state.clone());

        let now = Utc::now().timestamp();
        let mut claims = Claims::new(
            user.id,
            &user.username,
            &user.email,
            &user.role,
            TokenType::Refresh,
        );
        claims.iat = now - 10;
        claims.exp = now - 1;
        let expired = encode_claims(&claims, &state.jwt_keys).unwrap();

        let (status, body) = send(
            app.clone(),
            "POST",
            "/refresh",
            None,
            Some(json!({ "refresh_token": expired })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "refresh token expired");

        let (status, body) = send(
            app.clone(),
            "POST",
            "/refresh",
            None,
            Some(json!({ "refresh_token": "not.a.jwt" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid refresh token");

        let (status, body) = send(app, "POST", "/refresh", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "refresh token is required");
    }

    #[tokio::test]
    async fn deleted_user_cannot_refresh() {
        let mut user = make_user("jane", "jane@example.com", "hunter22", "User");
        user.deleted_at = Some(OffsetDateTime::now_utc());
        let state = test_state(Arc::new(MockDb::with_users(vec![user.clone()])));
        let refresh = token_for(&state, &user, TokenType::Refresh);

        let (status, body) = send(
            router(state),
            "POST",
            "/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "user not found");
    }
}
