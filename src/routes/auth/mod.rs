pub mod change_password;
pub mod claims;
pub mod login;
pub mod refresh;
pub mod register;
pub mod role_gate;
pub mod session;

pub use change_password::handle_change_password;
pub use login::handle_login;
pub use refresh::handle_refresh;
pub use register::handle_register;

use crate::errors::AppError;
use crate::models::user::{AuthResponse, User};
use crate::utils::jwt::{issue_token, JwtKeys};
use claims::TokenType;

pub(crate) fn sign(user: &User, kind: TokenType, keys: &JwtKeys) -> Result<String, AppError> {
    issue_token(user.id, &user.username, &user.email, &user.role, kind, keys).map_err(|e| {
        let message = match kind {
            TokenType::Access => "failed to generate access token",
            TokenType::Refresh => "failed to generate refresh token",
        };
        AppError::internal(message, e)
    })
}

/// Access and refresh tokens for a freshly authenticated user.
pub(crate) fn token_pair(user: User, keys: &JwtKeys) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        access_token: sign(&user, TokenType::Access, keys)?,
        refresh_token: sign(&user, TokenType::Refresh, keys)?,
        user,
    })
}
