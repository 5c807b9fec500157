use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    auth::verify_password,
    db::queries,
    error::{ApiResult, AppError},
    AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(username), Some(password)) = (
        req.username.filter(|u| !u.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request("Username and password required"));
    };

    let admin = queries::get_admin_by_username(&state.pool, &username)
        .await
        .map_err(|e| AppError::internal("Login failed", e))?;
    let Some(admin) = admin else {
        tracing::info!("Login rejected for unknown user '{}'", username);
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };
    if !verify_password(password, admin.password_hash.clone()).await {
        tracing::info!("Login rejected for '{}': wrong password", username);
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = state
        .jwt
        .issue(admin.id, &admin.username)
        .map_err(|e| AppError::internal("Failed to issue token", e))?;

    tracing::info!("Admin '{}' logged in", admin.username);
    Ok(Json(serde_json::json!({
        "token": token,
        "username": admin.username,
    })))
}
