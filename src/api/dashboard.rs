use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    aggregator::{distribution_by_name, SessionTally},
    cache::{get_or_compute, DASHBOARD_STATS_KEY},
    db::{
        models::DeviceStatus,
        queries::{self, ListQuery},
    },
    error::{ApiResult, AppError},
    AppState,
};

async fn compute_stats(state: &AppState) -> anyhow::Result<Value> {
    let total_devices = queries::count_devices(&state.pool, None).await?;
    let blocked_devices = queries::count_devices(&state.pool, Some(DeviceStatus::Blocked)).await?;
    let online_users = queries::count_active_sessions(&state.pool).await?;

    let registered = queries::list_access_points(&state.pool).await?;
    let stations = queries::active_sessions_by_station(&state.pool).await?;
    let tally = SessionTally::from_stations(&stations);
    let ap_distribution: Vec<Value> = distribution_by_name(&registered, &tally)
        .into_iter()
        .map(|(name, count)| json!({ "name": name, "count": count }))
        .collect();

    Ok(json!({
        "total_devices": total_devices,
        "blocked_devices": blocked_devices,
        "online_users": online_users,
        "ap_distribution": ap_distribution,
    }))
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let value = get_or_compute(
        state.stats_cache.as_ref(),
        DASHBOARD_STATS_KEY,
        state.config.stats_cache_ttl,
        || compute_stats(&state),
    )
    .await
    .map_err(|e| AppError::internal("Failed to fetch stats", e))?;
    Ok(Json(value))
}

/// `systemctl is-active <unit>`, or "unknown" when it cannot be asked
async fn service_state(unit: &str) -> String {
    let Ok(systemctl) = which::which("systemctl") else {
        return "unknown".into();
    };
    match tokio::process::Command::new(systemctl)
        .args(["is-active", unit])
        .output()
        .await
    {
        Ok(output) => {
            let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if state.is_empty() {
                "unknown".into()
            } else {
                state
            }
        }
        Err(e) => {
            tracing::warn!("systemctl is-active {} failed: {}", unit, e);
            "unknown".into()
        }
    }
}

/// GET /api/dashboard/status
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let freeradius = service_state(&state.config.freeradius_service).await;
    Json(json!({
        "freeradius": freeradius,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/dashboard/online-users
pub async fn online_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = queries::list_online_sessions(&state.pool, &params)
        .await
        .map_err(|e| AppError::internal("Failed to fetch online users", e))?;
    Ok(Json(page))
}
