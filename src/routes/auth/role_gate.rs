use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::models::role::RoleName;
use crate::routes::auth::claims::Claims;

/// Role a route group demands, passed to [`require_role`] as middleware state.
#[derive(Debug, Clone)]
pub struct RequiredRole(pub RoleName);

/// Must run after `require_access_token`. Role names are compared exactly.
pub async fn require_role(
    State(RequiredRole(required)): State<RequiredRole>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.role.as_str())
        .filter(|role| !role.is_empty())
        .ok_or(AppError::Unauthorized("user role not found"))?;

    if role != required.as_str() {
        return Err(AppError::Forbidden(format!(
            "this action requires {required} role"
        )));
    }

    Ok(next.run(req).await)
}
