//! Admin authentication: bcrypt password hashes and HS256 bearer tokens.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{db::queries, error::AppError, AppState};

const BCRYPT_COST: u32 = 10;

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Admin id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn admin_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expire_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, expire_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            expire_secs,
        }
    }

    pub fn issue(&self, admin_id: i64, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: admin_id.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now + self.expire_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

// ─── Passwords ────────────────────────────────────────────────────────────────

/// Hashing runs on the blocking pool
pub async fn hash_password(password: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Create the configured admin when the table is empty
pub async fn ensure_bootstrap_admin(pool: &SqlitePool, admin: Option<&(String, String)>) -> anyhow::Result<()> {
    if queries::count_admins(pool).await? > 0 {
        return Ok(());
    }
    match admin {
        Some((username, password)) => {
            let hash = hash_password(password.clone()).await?;
            queries::insert_admin(pool, username, &hash).await?;
            tracing::info!("Created bootstrap admin '{}'", username);
        }
        None => {
            tracing::warn!("No portal admins exist; set ADMIN_USERNAME and ADMIN_PASSWORD to create one");
        }
    }
    Ok(())
}

// ─── Middleware ───────────────────────────────────────────────────────────────

/// Require `Authorization: Bearer <token>` and expose the claims to handlers
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".into()))?;

    let claims = state.jwt.verify(token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
