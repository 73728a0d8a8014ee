use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::{
    db::user_repository::RepoError,
    errors::AppError,
    models::{
        admin::{
            CreateUserPayload, UpdateRolePayload, UpdateRoleResponse, UpdateUserPayload,
            UserListResponse,
        },
        role::RoleName,
        user::NewUser,
    },
    responses::JsonResponse,
    routes::{
        auth::session::AuthSession,
        extract::{parse_user_id, JsonBody},
    },
    state::AppState,
    utils::password::hash_password,
};

fn last_holder_error(privileged: &RoleName) -> AppError {
    AppError::Guard(format!(
        "cannot remove the last {}",
        privileged.as_str().to_lowercase()
    ))
}

pub async fn list_users(State(app_state): State<AppState>) -> Result<Response, AppError> {
    let users = app_state
        .db
        .list_users()
        .await
        .map_err(|e| AppError::internal("failed to get users", e))?;

    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    })
    .into_response())
}

/// Admin view of a single user, soft-deleted ones included.
pub async fn get_user(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user_id = parse_user_id(&id)?;
    let user = app_state
        .db
        .find_user_by_id_including_deleted(user_id)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::NotFound("user not found"))?;

    Ok(Json(user).into_response())
}

pub async fn create_user(
    State(app_state): State<AppState>,
    AuthSession(admin): AuthSession,
    JsonBody(payload): JsonBody<CreateUserPayload>,
) -> Result<Response, AppError> {
    if payload.username.is_empty()
        || payload.email.is_empty()
        || payload.password.is_empty()
        || payload.role.is_empty()
    {
        return Err(AppError::validation(
            "username, email, password, and role are required",
        ));
    }

    let role = app_state
        .config
        .roles
        .resolve(&payload.role)
        .ok_or_else(|| AppError::validation("invalid role"))?;

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::internal("failed to hash password", e))?;

    let user = app_state
        .db
        .create_user(NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            role: role.as_str(),
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::AlreadyExists("user already exists"),
            other => AppError::internal("failed to create user", other),
        })?;

    info!(admin_id = %admin.user_id, user_id = %user.id, role = %user.role, "admin created user");
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// Partial profile update. Blank or missing fields keep their stored value.
pub async fn update_user(
    State(app_state): State<AppState>,
    AuthSession(admin): AuthSession,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateUserPayload>,
) -> Result<Response, AppError> {
    let user_id = parse_user_id(&id)?;

    let username = payload.username.filter(|v| !v.is_empty());
    let email = payload.email.filter(|v| !v.is_empty());
    if username.is_none() && email.is_none() {
        return Err(AppError::validation(
            "at least username or email must be provided",
        ));
    }

    let current = app_state
        .db
        .find_user_by_id_including_deleted(user_id)
        .await
        .map_err(|e| AppError::internal("failed to get user", e))?
        .ok_or(AppError::NotFound("user not found"))?;

    let username = username.unwrap_or(current.username);
    let email = email.unwrap_or(current.email);

    let updated = app_state
        .db
        .update_user_profile(user_id, &username, &email)
        .await
        .map_err(|e| match e {
            RepoError::NotFound => AppError::NotFound("user not found"),
            RepoError::Conflict => AppError::AlreadyExists("username or email already exists"),
            other => AppError::internal("failed to update user", other),
        })?;

    info!(admin_id = %admin.user_id, %user_id, "admin updated user");
    Ok(Json(updated).into_response())
}

pub async fn delete_user(
    State(app_state): State<AppState>,
    AuthSession(admin): AuthSession,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user_id = parse_user_id(&id)?;
    if user_id == admin.user_id {
        return Err(AppError::Guard("cannot delete your own account".into()));
    }

    let privileged = app_state.config.privileged_role();
    app_state
        .db
        .soft_delete_user(user_id, privileged.as_str())
        .await
        .map_err(|e| match e {
            RepoError::NotFound => AppError::NotFound("user not found"),
            RepoError::LastPrivilegedHolder => last_holder_error(privileged),
            other => AppError::internal("failed to delete user", other),
        })?;

    info!(admin_id = %admin.user_id, %user_id, "admin deleted user");
    Ok(JsonResponse::message("user deleted successfully"))
}

pub async fn update_user_role(
    State(app_state): State<AppState>,
    AuthSession(admin): AuthSession,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateRolePayload>,
) -> Result<Response, AppError> {
    let user_id = parse_user_id(&id)?;

    if payload.role.is_empty() {
        return Err(AppError::validation("role is required"));
    }
    let roles = &app_state.config.roles;
    let role = roles
        .resolve(&payload.role)
        .ok_or_else(|| AppError::validation("invalid role"))?;

    if user_id == admin.user_id {
        return Err(AppError::Guard("cannot change your own role".into()));
    }

    let privileged = roles.privileged();
    let user = app_state
        .db
        .update_user_role(user_id, role.as_str(), privileged.as_str())
        .await
        .map_err(|e| match e {
            RepoError::NotFound => AppError::NotFound("user not found"),
            RepoError::LastPrivilegedHolder => last_holder_error(privileged),
            other => AppError::internal("failed to update user role", other),
        })?;

    info!(admin_id = %admin.user_id, %user_id, role = %user.role, "admin changed user role");
    Ok(Json(UpdateRoleResponse {
        message: "user role updated successfully".into(),
        user,
    })
    .into_response())
}
