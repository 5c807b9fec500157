use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    aggregator,
    cache::DASHBOARD_STATS_KEY,
    db::queries,
    error::{ApiResult, AppError},
    mac,
    ws::LiveEvent,
    AppState,
};

#[derive(Deserialize)]
pub struct CreateAccessPointRequest {
    pub mac_address: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAccessPointRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// GET /api/access-points
pub async fn list_access_points(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let loads = aggregator::access_point_loads(&state.pool, &state.event_tx)
        .await
        .map_err(|e| AppError::internal("Failed to fetch access points", e))?;
    Ok(Json(loads))
}

/// POST /api/access-points
pub async fn add_access_point(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccessPointRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let (Some(raw_mac), Some(name)) = (req.mac_address.filter(|m| !m.trim().is_empty()), name) else {
        return Err(AppError::bad_request("MAC Address and Name are required"));
    };
    let mac = mac::normalize(&raw_mac)?;
    let location = req.location.unwrap_or_default();

    let id = queries::insert_access_point(&state.pool, &mac, &name, &location)
        .await
        .map_err(|e| AppError::from_db(e, "Access point already exists", "Failed to add access point"))?;
    let ap = queries::get_access_point(&state.pool, id)
        .await
        .map_err(|e| AppError::internal("Failed to add access point", e))?
        .ok_or_else(|| AppError::internal("Failed to add access point", "inserted row not found"))?;

    tracing::info!("Access point {} ({}) registered", ap.mac_address, ap.name);
    state.stats_cache.invalidate(DASHBOARD_STATS_KEY);
    let _ = state.event_tx.send(LiveEvent::AccessPointRegistered {
        access_point: ap.clone(),
        auto: false,
    });
    Ok((StatusCode::CREATED, Json(ap)))
}

/// PUT /api/access-points/:id
pub async fn update_access_point(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAccessPointRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut ap = queries::get_access_point(&state.pool, id)
        .await
        .map_err(|e| AppError::internal("Failed to update access point", e))?
        .ok_or_else(|| AppError::not_found("Access point not found"))?;

    if let Some(name) = req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        ap.name = name;
    }
    if let Some(location) = req.location {
        ap.location = location;
    }

    let updated = queries::update_access_point(&state.pool, id, &ap.name, &ap.location)
        .await
        .map_err(|e| AppError::internal("Failed to update access point", e))?;
    if !updated {
        return Err(AppError::not_found("Access point not found"));
    }

    state.stats_cache.invalidate(DASHBOARD_STATS_KEY);
    Ok(Json(ap))
}

/// DELETE /api/access-points/:id
pub async fn delete_access_point(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let deleted = queries::delete_access_point(&state.pool, id)
        .await
        .map_err(|e| AppError::internal("Failed to delete access point", e))?;

    if deleted {
        tracing::info!("Access point {} deleted", id);
        state.stats_cache.invalidate(DASHBOARD_STATS_KEY);
        let _ = state.event_tx.send(LiveEvent::AccessPointRemoved { id });
    }
    Ok(Json(serde_json::json!({ "message": "Access point deleted" })))
}
