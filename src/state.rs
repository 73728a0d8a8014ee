use std::sync::Arc;

use crate::config::Config;
use crate::db::user_repository::UserRepository;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn UserRepository>,
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::AppState;
    use crate::config::test_config;
    use crate::db::{mock_db::MockDb, user_repository::UserRepository};
    use crate::models::user::User;
    use crate::routes::auth::claims::TokenType;
    use crate::utils::{
        jwt::{issue_token, JwtKeys},
        password::hash_password,
    };

    pub const TEST_SECRET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

    pub fn test_state(db: Arc<MockDb>) -> AppState {
        AppState {
            db: db as Arc<dyn UserRepository>,
            config: Arc::new(test_config()),
            jwt_keys: Arc::new(JwtKeys::from_secret(TEST_SECRET).unwrap()),
        }
    }

    pub fn make_user(username: &str, email: &str, password: &str, role: &str) -> User {
        let now = time::OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: hash_password(password).unwrap(),
            role: role.into(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn token_for(state: &AppState, user: &User, kind: TokenType) -> String {
        issue_token(
            user.id,
            &user.username,
            &user.email,
            &user.role,
            kind,
            &state.jwt_keys,
        )
        .unwrap()
    }

    /// Sends one request through `app` and returns the status and JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn send(
        app: axum::Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (axum::http::StatusCode, serde_json::Value) {
        use axum::{body::Body, http::header, http::Request};
        use tower::ServiceExt;

        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
