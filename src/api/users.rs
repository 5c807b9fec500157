use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    auth::{hash_password, Claims},
    db::queries,
    error::{ApiResult, AppError},
    AppState,
};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub password: Option<String>,
}

/// GET /api/users
pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let admins = queries::list_admins(&state.pool)
        .await
        .map_err(|e| AppError::internal("Failed to fetch users", e))?;
    Ok(Json(admins))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    let (Some(username), Some(password)) = (username, req.password.filter(|p| !p.is_empty())) else {
        return Err(AppError::bad_request("Username and password required"));
    };

    let hash = hash_password(password)
        .await
        .map_err(|e| AppError::internal("Failed to create user", e))?;
    let id = queries::insert_admin(&state.pool, &username, &hash)
        .await
        .map_err(|e| AppError::from_db(e, "Username already exists", "Failed to create user"))?;

    tracing::info!("Portal admin '{}' created", username);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "username": username })),
    ))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if claims.admin_id() == Some(id) {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let deleted = queries::delete_admin(&state.pool, id)
        .await
        .map_err(|e| AppError::internal("Failed to delete user", e))?;
    if deleted {
        tracing::info!("Portal admin {} deleted by '{}'", id, claims.username);
    }
    Ok(Json(serde_json::json!({ "message": "User deleted" })))
}

/// PUT /api/users/:id/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(password) = req.password.filter(|p| !p.is_empty()) else {
        return Err(AppError::bad_request("Password required"));
    };

    let hash = hash_password(password)
        .await
        .map_err(|e| AppError::internal("Failed to update password", e))?;
    let updated = queries::update_admin_password(&state.pool, id, &hash)
        .await
        .map_err(|e| AppError::internal("Failed to update password", e))?;
    if !updated {
        return Err(AppError::not_found("User not found"));
    }

    tracing::info!("Password changed for portal admin {}", id);
    Ok(Json(serde_json::json!({ "message": "Password updated successfully" })))
}
