use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::routes::auth::claims::{Claims, TokenType};
use crate::utils::jwt::{verify_token, JwtKeys, TokenError};

/// Claims of the authenticated caller, as placed in request extensions by
/// [`require_access_token`].
#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthSession)
            .ok_or(AppError::Unauthorized("unauthorized"))
    }
}

/// Rejects requests without a valid `Bearer` access token.
pub async fn require_access_token(
    State(keys): State<Arc<JwtKeys>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(req.headers(), &keys)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<Claims, AppError> {
    let token = bearer_token(headers)?;

    let claims = verify_token(token, keys).map_err(|e| match e {
        TokenError::Expired => AppError::ExpiredToken("token expired"),
        TokenError::Invalid => AppError::InvalidToken("invalid token"),
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::InvalidToken("invalid token type"));
    }
    Ok(claims)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AppError::Unauthorized("missing authorization header")),
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid authorization header format"))?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Ok(token),
        _ => Err(AppError::Unauthorized("invalid authorization header format")),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::state::test_support::TEST_SECRET;
    use crate::utils::jwt::{encode_claims, issue_token};

    fn keys() -> Arc<JwtKeys> {
        Arc::new(JwtKeys::from_secret(TEST_SECRET).unwrap())
    }

    fn app(keys: Arc<JwtKeys>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|AuthSession(claims): AuthSession| async move { claims.username }),
            )
            .route_layer(from_fn_with_state(keys, require_access_token))
    }

    async fn call(keys: Arc<JwtKeys>, auth: Option<&str>) -> (StatusCode, String) {
        let mut req = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            req = req.header(AUTHORIZATION, value);
        }
        let resp = app(keys)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), 4096).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn token(keys: &JwtKeys, kind: TokenType) -> String {
        issue_token(Uuid::new_v4(), "jane", "jane@example.com", "User", kind, keys).unwrap()
    }

    #[tokio::test]
    async fn valid_access_token_reaches_handler() {
        let keys = keys();
        let bearer = format!("Bearer {}", token(&keys, TokenType::Access));
        let (status, body) = call(keys, Some(bearer.as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "jane");
    }

    #[tokio::test]
    async fn missing_or_empty_header_is_rejected() {
        let (status, body) = call(keys(), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"missing authorization header"}"#);

        let (status, body) = call(keys(), Some("")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"missing authorization header"}"#);
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let keys = keys();
        let raw = token(&keys, TokenType::Access);
        for value in [
            raw.clone(),
            format!("bearer {raw}"),
            format!("Bearer  {raw}"),
            format!("Token {raw}"),
        ] {
            let (status, body) = call(keys.clone(), Some(value.as_str())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{value}");
            assert_eq!(body, r#"{"error":"invalid authorization header format"}"#);
        }
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let keys = keys();
        let bearer = format!("Bearer {}", token(&keys, TokenType::Refresh));
        let (status, body) = call(keys, Some(bearer.as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"invalid token type"}"#);
    }

    #[tokio::test]
    async fn expired_and_forged_tokens_are_distinguished() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let mut claims = Claims::new(
            Uuid::new_v4(),
            "jane",
            "jane@example.com",
            "User",
            TokenType::Access,
        );
        claims.iat = now - 3600;
        claims.exp = now - 60;
        let expired = encode_claims(&claims, &keys).unwrap();
        let (status, body) = call(keys.clone(), Some(format!("Bearer {expired}").as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"token expired"}"#);

        let other = JwtKeys::from_secret("zyxwvutsrqponmlkjihgfedcba9876543210").unwrap();
        let forged = token(&other, TokenType::Access);
        let (status, body) = call(keys, Some(format!("Bearer {forged}").as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"invalid token"}"#);
    }

    #[tokio::test]
    async fn extractor_without_middleware_is_unauthorized() {
        let app = Router::new().route(
            "/whoami",
            get(|AuthSession(claims): AuthSession| async move { claims.username }),
        );
        let resp = app
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
