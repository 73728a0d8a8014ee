use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;

use super::user_repository::{RepoError, UserRepository};
use crate::models::{
    role::{same_role, Role},
    user::{NewUser, User},
};

/// In-memory repository with the same uniqueness and soft-delete rules as the
/// Postgres schema. Every operation runs under one lock.
#[derive(Default)]
pub struct MockDb {
    pub should_fail: bool,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    roles: Vec<Role>,
    users: Vec<User>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let db = Self::default();
        db.lock().users = users;
        db
    }

    pub fn users(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.lock().roles.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.should_fail {
            return Err(RepoError::Database(sqlx::Error::Protocol(
                "Mock DB failure".into(),
            )));
        }
        Ok(())
    }
}

fn taken(users: &[User], except: Option<Uuid>, username: &str, email: &str) -> bool {
    users.iter().any(|u| {
        Some(u.id) != except && (u.username == username || u.email == email)
    })
}

fn active_holders(users: &[User], privileged_role: &str) -> usize {
    users
        .iter()
        .filter(|u| u.is_active() && same_role(&u.role, privileged_role))
        .count()
}

#[async_trait]
impl UserRepository for MockDb {
    async fn create_role(&self, name: &str) -> Result<Role, RepoError> {
        self.check()?;
        let mut state = self.lock();
        if let Some(existing) = state.roles.iter().find(|r| r.name == name) {
            return Ok(existing.clone());
        }
        let role = Role {
            id: state.roles.len() as i32 + 1,
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError> {
        self.check()?;
        Ok(self.lock().roles.iter().find(|r| r.name == name).cloned())
    }

    async fn create_user(&self, new_user: NewUser<'_>) -> Result<User, RepoError> {
        self.check()?;
        let mut state = self.lock();
        if taken(&state.users, None, new_user.username, new_user.email) {
            return Err(RepoError::Conflict);
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.to_string(),
            email: new_user.email.to_string(),
            password_hash: new_user.password_hash.to_string(),
            role: new_user.role.to_string(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.check()?;
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email == email && u.is_active())
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepoError> {
        self.check()?;
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id && u.is_active())
            .cloned())
    }

    async fn find_user_by_id_including_deleted(
        &self,
        user_id: Uuid,
    ) -> Result<Option<User>, RepoError> {
        self.check()?;
        Ok(self.lock().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        self.check()?;
        let mut users = self.lock().users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<User, RepoError> {
        self.check()?;
        let mut state = self.lock();
        if !state.users.iter().any(|u| u.id == user_id && u.is_active()) {
            return Err(RepoError::NotFound);
        }
        if taken(&state.users, Some(user_id), username, email) {
            return Err(RepoError::Conflict);
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(RepoError::NotFound)?;
        user.username = username.to_string();
        user.email = email.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        self.check()?;
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.is_active())
            .ok_or(RepoError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn soft_delete_user(
        &self,
        user_id: Uuid,
        privileged_role: &str,
    ) -> Result<(), RepoError> {
        self.check()?;
        let mut state = self.lock();
        let holders = active_holders(&state.users, privileged_role);
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.is_active())
            .ok_or(RepoError::NotFound)?;
        if same_role(&user.role, privileged_role) && holders <= 1 {
            return Err(RepoError::LastPrivilegedHolder);
        }
        let now = OffsetDateTime::now_utc();
        user.deleted_at = Some(now);
        user.updated_at = now;
        Ok(())
    }

    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: &str,
        privileged_role: &str,
    ) -> Result<User, RepoError> {
        self.check()?;
        let mut state = self.lock();

        let holders = active_holders(&state.users, privileged_role);

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id && u.is_active())
            .ok_or(RepoError::NotFound)?;

        let demoting = same_role(&user.role, privileged_role)
            && !same_role(role, privileged_role);
        if demoting && holders <= 1 {
            return Err(RepoError::LastPrivilegedHolder);
        }

        user.role = role.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }
}
