use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access tokens authenticate requests, refresh tokens only mint new access tokens.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn lifetime(self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(15),
            TokenType::Refresh => Duration::days(7),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub token_type: TokenType,
    pub iat: i64, // issued at (UNIX seconds)
    pub exp: i64, // expiration (UNIX seconds)
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
        token_type: TokenType,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: username.into(),
            email: email.into(),
            role: role.into(),
            token_type,
            iat: now.timestamp(),
            exp: (now + token_type.lifetime()).timestamp(),
        }
    }
}
