use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    role::Role,
    user::{NewUser, User},
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("username or email already taken")]
    Conflict,
    #[error("the last active holder of the privileged role cannot lose it")]
    LastPrivilegedHolder,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Storage for users and roles.
///
/// Lookups by email or id only see active users; the `_including_deleted`
/// variant is the admin view and also returns soft-deleted rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Idempotent: returns the existing role when the name is already present.
    async fn create_role(&self, name: &str) -> Result<Role, RepoError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError>;

    async fn create_user(&self, new_user: NewUser<'_>) -> Result<User, RepoError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_user_by_id_including_deleted(
        &self,
        user_id: Uuid,
    ) -> Result<Option<User>, RepoError>;
    /// Every user, soft-deleted ones included, newest first.
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<User, RepoError>;
    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepoError>;
    /// Sets `deleted_at`. Already-deleted users count as not found.
    ///
    /// Fails with `LastPrivilegedHolder` when the target is the only active
    /// holder of `privileged_role`, atomically like `update_user_role`.
    async fn soft_delete_user(
        &self,
        user_id: Uuid,
        privileged_role: &str,
    ) -> Result<(), RepoError>;

    /// Changes an active user's role.
    ///
    /// Fails with `LastPrivilegedHolder` when the target is the only active user
    /// holding `privileged_role` and `role` is something else. The count and the
    /// write happen atomically.
    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: &str,
        privileged_role: &str,
    ) -> Result<User, RepoError>;
}
