use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{
    role::{same_role, Role},
    user::{NewUser, User},
};

use super::user_repository::{RepoError, UserRepository};

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code == "23505";
        }
    }
    false
}

type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

/// Locks every active privileged row in id order. Guarded writes take this
/// lock before touching the target row.
async fn lock_privileged_holders(
    tx: &mut Tx,
    privileged_role: &str,
) -> Result<Vec<Uuid>, RepoError> {
    let holders = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM users
        WHERE lower(role) = lower($1) AND deleted_at IS NULL
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(privileged_role)
    .fetch_all(&mut **tx)
    .await?;
    Ok(holders)
}

async fn lock_active_user(tx: &mut Tx, user_id: Uuid) -> Result<Option<User>, RepoError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role, deleted_at, created_at, updated_at
        FROM users
        WHERE id = $1 AND deleted_at IS NULL
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(user)
}

fn map_write_error(err: sqlx::Error) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::Conflict
    } else {
        RepoError::Database(err)
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_role(&self, name: &str) -> Result<Role, RepoError> {
        let inserted = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(role) => Ok(role),
            None => self
                .find_role_by_name(name)
                .await?
                .ok_or(RepoError::NotFound),
        }
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepoError> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name, created_at FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn create_user(&self, new_user: NewUser<'_>) -> Result<User, RepoError> {
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, username, email, password_hash, role, deleted_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(new_user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, deleted_at, created_at, updated_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, deleted_at, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id_including_deleted(
        &self,
        user_id: Uuid,
    ) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, deleted_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, deleted_at, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
    ) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $1, email = $2, updated_at = $3
            WHERE id = $4 AND deleted_at IS NULL
            RETURNING id, username, email, password_hash, role, deleted_at, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(OffsetDateTime::now_utc())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or(RepoError::NotFound)
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn soft_delete_user(
        &self,
        user_id: Uuid,
        privileged_role: &str,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        let holders = lock_privileged_holders(&mut tx, privileged_role).await?;

        let Some(target) = lock_active_user(&mut tx, user_id).await? else {
            tx.rollback().await?;
            return Err(RepoError::NotFound);
        };

        if same_role(&target.role, privileged_role) && holders.len() <= 1 {
            tx.rollback().await?;
            return Err(RepoError::LastPrivilegedHolder);
        }

        let now = OffsetDateTime::now_utc();
        sqlx::query("UPDATE users SET deleted_at = $1, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_user_role(
        &self,
        user_id: Uuid,
        role: &str,
        privileged_role: &str,
    ) -> Result<User, RepoError> {
        let mut tx = self.pool.begin().await?;

        let holders = lock_privileged_holders(&mut tx, privileged_role).await?;
        let target = lock_active_user(&mut tx, user_id).await?;

        let Some(target) = target else {
            tx.rollback().await?;
            return Err(RepoError::NotFound);
        };

        let demoting = same_role(&target.role, privileged_role)
            && !same_role(role, privileged_role);
        if demoting && holders.len() <= 1 {
            tx.rollback().await?;
            return Err(RepoError::LastPrivilegedHolder);
        }

        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $1, updated_at = $2
            WHERE id = $3
            RETURNING id, username, email, password_hash, role, deleted_at, created_at, updated_at
            "#,
        )
        .bind(role)
        .bind(OffsetDateTime::now_utc())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
