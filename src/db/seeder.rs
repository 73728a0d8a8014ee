use thiserror::Error;
use tracing::{info, warn};

use super::user_repository::{RepoError, UserRepository};
use crate::models::{
    role::{RoleName, RoleSet},
    user::NewUser,
};
use crate::utils::password::hash_password;

pub const SUPER_ADMIN_USERNAME: &str = "superadmin";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to seed role {role}: {source}")]
    Role {
        role: String,
        #[source]
        source: RepoError,
    },
    #[error("failed to look up the super admin: {0}")]
    Lookup(#[source] RepoError),
    #[error("failed to hash the super admin password: {0}")]
    Hash(password_hash::Error),
    #[error("failed to create the super admin: {0}")]
    Create(#[source] RepoError),
}

/// Creates every configured role. Safe to run on every start.
pub async fn seed_roles(repo: &dyn UserRepository, roles: &RoleSet) -> Result<(), SeedError> {
    for role in roles.iter() {
        repo.create_role(role.as_str())
            .await
            .map_err(|source| SeedError::Role {
                role: role.to_string(),
                source,
            })?;
    }
    info!(count = roles.len(), "roles seeded");
    Ok(())
}

/// Creates the initial privileged user unless one with `email` already exists.
pub async fn seed_super_admin(
    repo: &dyn UserRepository,
    email: &str,
    password: &str,
    privileged_role: &RoleName,
) -> Result<(), SeedError> {
    if repo
        .find_user_by_email(email)
        .await
        .map_err(SeedError::Lookup)?
        .is_some()
    {
        info!(%email, "super admin already exists");
        return Ok(());
    }

    let password_hash = hash_password(password).map_err(SeedError::Hash)?;
    let created = repo
        .create_user(NewUser {
            username: SUPER_ADMIN_USERNAME,
            email,
            password_hash: &password_hash,
            role: privileged_role.as_str(),
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, %email, "super admin created");
            Ok(())
        }
        Err(RepoError::Conflict) => {
            // Username taken or the account was soft-deleted; leave it for an operator.
            warn!(%email, "super admin username or email already in use, skipping");
            Ok(())
        }
        Err(e) => Err(SeedError::Create(e)),
    }
}
