use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateUserPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

/// Both fields optional; blank values keep the stored value.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct UpdateUserPayload {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateRolePayload {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub total: usize,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRoleResponse {
    pub message: String,
    pub user: User,
}
