use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    api::IdList,
    db::{
        models::{split_ssids, DeviceStatus},
        queries::{self, ListQuery},
    },
    devices::{DevicePatch, DeviceService, ImportEntry},
    error::{ApiResult, AppError},
    AppState,
};

#[derive(Deserialize)]
pub struct CreateDeviceRequest {
    pub mac_address: Option<String>,
    pub alias: Option<String>,
    pub group_name: Option<String>,
    pub status: Option<String>,
    pub allowed_ssids: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkAddRequest {
    #[serde(default)]
    pub devices: Vec<BulkDeviceEntry>,
}

#[derive(Deserialize)]
pub struct BulkDeviceEntry {
    pub mac_address: Option<String>,
    pub alias: Option<String>,
    pub group_name: Option<String>,
    pub allowed_ssids: Option<String>,
}

impl From<BulkDeviceEntry> for ImportEntry {
    fn from(e: BulkDeviceEntry) -> Self {
        ImportEntry {
            mac_address: e.mac_address,
            alias: e.alias,
            group_name: e.group_name,
            allowed_ssids: e.allowed_ssids,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateDeviceRequest {
    pub mac_address: Option<String>,
    pub alias: Option<String>,
    pub group_name: Option<String>,
    pub allowed_ssids: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkGroupRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub group_name: Option<String>,
}

fn parse_status(raw: Option<&str>) -> ApiResult<DeviceStatus> {
    raw.and_then(DeviceStatus::parse)
        .ok_or_else(|| AppError::bad_request("Invalid status"))
}

fn require_ids(ids: &[i64]) -> ApiResult<()> {
    if ids.is_empty() {
        return Err(AppError::bad_request("No devices selected"));
    }
    Ok(())
}

/// GET /api/devices
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = queries::list_devices(&state.pool, &params)
        .await
        .map_err(|e| AppError::internal("Failed to fetch devices", e))?;
    Ok(Json(page))
}

/// GET /api/devices/ssids
pub async fn list_ssids(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let lists = queries::list_ssid_lists(&state.pool)
        .await
        .map_err(|e| AppError::internal("Failed to fetch SSIDs", e))?;
    let ssids: BTreeSet<String> = lists
        .iter()
        .flat_map(|list| split_ssids(Some(list)))
        .collect();
    Ok(Json(ssids.into_iter().collect::<Vec<_>>()))
}

/// POST /api/devices
pub async fn add_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDeviceRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(mac) = req.mac_address.filter(|m| !m.trim().is_empty()) else {
        return Err(AppError::bad_request("MAC Address is required"));
    };
    let status = match req.status.as_deref() {
        None | Some("") => DeviceStatus::Allowed,
        other => parse_status(other)?,
    };

    let device = DeviceService::new(&state)
        .create(&mac, req.alias, req.group_name, status, req.allowed_ssids)
        .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// POST /api/devices/bulk
pub async fn bulk_add(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkAddRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.devices.is_empty() {
        return Err(AppError::bad_request("No devices provided"));
    }

    let entries = req.devices.into_iter().map(ImportEntry::from).collect();
    let report = DeviceService::new(&state).import(entries).await;
    Ok(Json(serde_json::json!({
        "message": format!("Processed: {} added, {} failed", report.success, report.failed),
        "results": report,
    })))
}

/// PUT /api/devices/:id
pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateDeviceRequest>,
) -> ApiResult<impl IntoResponse> {
    let patch = DevicePatch {
        mac_address: req.mac_address,
        alias: req.alias,
        group_name: req.group_name,
        allowed_ssids: req.allowed_ssids,
    };
    let device = DeviceService::new(&state).update(id, patch).await?;
    Ok(Json(device))
}

/// PUT /api/devices/:id/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = parse_status(req.status.as_deref())?;
    let device = DeviceService::new(&state).set_status(id, status).await?;
    Ok(Json(device))
}

/// PUT /api/devices/bulk/status
pub async fn bulk_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    require_ids(&req.ids)?;
    let status = parse_status(req.status.as_deref())?;

    let updated = DeviceService::new(&state).set_status_many(&req.ids, status).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Updated {} device(s)", updated),
        "updated": updated,
    })))
}

/// PUT /api/devices/bulk/group
pub async fn bulk_group(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    require_ids(&req.ids)?;

    let updated = DeviceService::new(&state).set_group_many(&req.ids, req.group_name).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Updated {} device(s)", updated),
        "updated": updated,
    })))
}

/// DELETE /api/devices/:id
pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    DeviceService::new(&state).delete_many(&[id]).await?;
    Ok(Json(serde_json::json!({ "message": "Device deleted" })))
}

/// DELETE /api/devices/bulk
pub async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdList>,
) -> ApiResult<impl IntoResponse> {
    require_ids(&req.ids)?;

    let deleted = DeviceService::new(&state).delete_many(&req.ids).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Deleted {} device(s)", deleted),
        "deleted": deleted,
    })))
}

/// GET /api/devices/:id/policy
pub async fn device_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let rules = DeviceService::new(&state).policy(id).await?;
    Ok(Json(rules))
}
