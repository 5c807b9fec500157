use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cache::{StatsCache, DASHBOARD_STATS_KEY};
use crate::config::SsidMatchMode;
use crate::db::models::{split_ssids, DeviceStatus, ManagedDevice, RadCheckRule};
use crate::db::queries::{self, NewDevice};
use crate::error::{ApiResult, AppError};
use crate::mac;
use crate::radius::{
    self,
    locks::{MacGuard, MacLocks},
};
use crate::ws::LiveEvent;
use crate::AppState;

/// How often to re-read devices whose MAC changed while we waited for the lock
const LOCK_ATTEMPTS: usize = 3;

/// Changes to a device's details; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub mac_address: Option<String>,
    pub alias: Option<String>,
    /// Empty string clears the group
    pub group_name: Option<String>,
    /// Empty string lifts the SSID restriction
    pub allowed_ssids: Option<String>,
}

/// One row of a bulk import
#[derive(Debug, Clone, Default)]
pub struct ImportEntry {
    pub mac_address: Option<String>,
    pub alias: Option<String>,
    pub group_name: Option<String>,
    pub allowed_ssids: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedDevice {
    pub mac: String,
    pub alias: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub success: usize,
    pub failed: usize,
    pub added: Vec<ImportedDevice>,
    pub errors: Vec<String>,
}

/// Stored form of `allowed_ssids`: trimmed names joined by ',' or NULL
pub fn normalize_ssid_list(raw: Option<&str>) -> Option<String> {
    let names = split_ssids(raw);
    if names.is_empty() {
        None
    } else {
        Some(names.join(","))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Device CRUD that keeps `radcheck` in step with `managed_devices`.
///
/// Every mutation runs in one transaction covering both tables while holding
/// the lock of every MAC it touches. When the RADIUS rewrite fails the
/// metadata change is rolled back with it.
pub struct DeviceService {
    pool: SqlitePool,
    locks: Arc<MacLocks>,
    event_tx: broadcast::Sender<LiveEvent>,
    cache: Arc<dyn StatsCache>,
    ssid_mode: SsidMatchMode,
}

impl DeviceService {
    pub fn new(state: &AppState) -> Self {
        DeviceService {
            pool: state.pool.clone(),
            locks: state.mac_locks.clone(),
            event_tx: state.event_tx.clone(),
            cache: state.stats_cache.clone(),
            ssid_mode: state.config.ssid_match_mode,
        }
    }

    fn changed(&self, device: &ManagedDevice) {
        self.cache.invalidate(DASHBOARD_STATS_KEY);
        let _ = self.event_tx.send(LiveEvent::DeviceChanged {
            device: device.clone(),
        });
    }

    fn removed(&self, ids: Vec<i64>) {
        self.cache.invalidate(DASHBOARD_STATS_KEY);
        let _ = self.event_tx.send(LiveEvent::DevicesRemoved { ids });
    }

    async fn begin(&self) -> ApiResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::internal("Failed to start transaction", e))
    }

    /// Lock the MACs of `ids` (plus `extra`) and return the devices as stored
    /// once the locks are held.
    ///
    /// A MAC only changes under the lock of the old MAC, so devices that still
    /// carry a locked MAC after acquiring cannot change until the guard drops.
    async fn lock_devices(&self, ids: &[i64], extra: Option<&str>) -> ApiResult<(MacGuard, Vec<ManagedDevice>)> {
        for _ in 0..LOCK_ATTEMPTS {
            let before = queries::get_devices_by_ids(&self.pool, ids)
                .await
                .map_err(|e| AppError::internal("Failed to load devices", e))?;
            let macs: HashSet<String> = before
                .into_iter()
                .map(|d| d.mac_address)
                .chain(extra.map(str::to_string))
                .collect();
            let guard = self.locks.lock_many(macs.iter().map(String::as_str)).await;

            let after = queries::get_devices_by_ids(&self.pool, ids)
                .await
                .map_err(|e| AppError::internal("Failed to load devices", e))?;
            if after.iter().all(|d| macs.contains(&d.mac_address)) {
                return Ok((guard, after));
            }
            tracing::debug!("Device MAC changed while locking, retrying");
        }
        Err(AppError::conflict("Device is being modified, try again"))
    }

    async fn lock_device(&self, id: i64, extra: Option<&str>) -> ApiResult<(MacGuard, ManagedDevice)> {
        let (guard, mut devices) = self.lock_devices(&[id], extra).await?;
        match devices.pop() {
            Some(device) => Ok((guard, device)),
            None => Err(AppError::not_found("Device not found")),
        }
    }

    pub async fn create(
        &self,
        mac_input: &str,
        alias: Option<String>,
        group_name: Option<String>,
        status: DeviceStatus,
        allowed_ssids: Option<String>,
    ) -> ApiResult<ManagedDevice> {
        let mac = mac::normalize(mac_input)?;
        let new = NewDevice {
            mac_address: mac.clone(),
            alias: alias.map(|a| a.trim().to_string()).unwrap_or_default(),
            group_name: non_empty(group_name),
            status,
            allowed_ssids: normalize_ssid_list(allowed_ssids.as_deref()),
        };

        let _guard = self.locks.lock(&mac).await;
        let mut tx = self.begin().await?;

        let id = queries::insert_device(&mut *tx, &new)
            .await
            .map_err(|e| AppError::from_db(e, "Device already exists", "Failed to add device"))?;
        let ssids = split_ssids(new.allowed_ssids.as_deref());
        radius::sync(&mut tx, &mac, status, &ssids, self.ssid_mode).await?;
        let device = queries::get_device(&mut *tx, id)
            .await
            .map_err(|e| AppError::internal("Failed to add device", e))?
            .ok_or_else(|| AppError::internal("Failed to add device", "inserted row not found"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::internal("Failed to add device", e))?;

        tracing::info!("Device {} added ({})", device.mac_address, status.as_str());
        self.changed(&device);
        Ok(device)
    }

    /// Import devices as `allowed`. Each entry succeeds or fails on its own.
    pub async fn import(&self, entries: Vec<ImportEntry>) -> ImportReport {
        let mut report = ImportReport::default();

        for entry in entries {
            let Some(raw_mac) = non_empty(entry.mac_address) else {
                report.failed += 1;
                report.errors.push("Missing MAC address".into());
                continue;
            };

            let result = self
                .create(&raw_mac, entry.alias, entry.group_name, DeviceStatus::Allowed, entry.allowed_ssids)
                .await;
            match result {
                Ok(device) => {
                    report.success += 1;
                    report.added.push(ImportedDevice {
                        mac: device.mac_address,
                        alias: device.alias,
                    });
                }
                Err(err) => {
                    report.failed += 1;
                    let reason = match err {
                        AppError::InvalidMac(_) => "Invalid format".to_string(),
                        AppError::Conflict(_) => "Already exists".to_string(),
                        AppError::BadRequest(msg) => msg,
                        _ => "Database error".to_string(),
                    };
                    report.errors.push(format!("{}: {}", raw_mac, reason));
                }
            }
        }

        tracing::info!("Bulk import: {} added, {} failed", report.success, report.failed);
        report
    }

    pub async fn update(&self, id: i64, patch: DevicePatch) -> ApiResult<ManagedDevice> {
        let new_mac = match non_empty(patch.mac_address) {
            Some(raw) => Some(mac::normalize(&raw)?),
            None => None,
        };

        let (_guard, current) = self.lock_device(id, new_mac.as_deref()).await?;

        let mut updated = current.clone();
        if let Some(m) = new_mac {
            updated.mac_address = m;
        }
        if let Some(alias) = patch.alias {
            updated.alias = alias.trim().to_string();
        }
        if let Some(group) = patch.group_name {
            updated.group_name = non_empty(Some(group));
        }
        if let Some(ssids) = patch.allowed_ssids {
            updated.allowed_ssids = normalize_ssid_list(Some(&ssids));
        }
        let mac_changed = updated.mac_address != current.mac_address;

        // The first statement writes, so the transaction never has to upgrade
        // a read snapshot; a taken MAC surfaces as a unique violation.
        let mut tx = self.begin().await?;
        queries::update_device_details(&mut *tx, &updated)
            .await
            .map_err(|e| AppError::from_db(e, "MAC Address already in use", "Failed to update device"))?;
        if mac_changed {
            radius::remove(&mut tx, &current.mac_address).await?;
        }
        radius::sync(&mut tx, &updated.mac_address, updated.status, &updated.ssid_list(), self.ssid_mode).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::internal("Failed to update device", e))?;

        if mac_changed {
            tracing::info!("Device {} renamed to {}", current.mac_address, updated.mac_address);
        } else {
            tracing::info!("Device {} updated", updated.mac_address);
        }
        self.changed(&updated);
        Ok(updated)
    }

    pub async fn set_status(&self, id: i64, status: DeviceStatus) -> ApiResult<ManagedDevice> {
        let (_guard, mut device) = self.lock_device(id, None).await?;

        let mut tx = self.begin().await?;
        queries::update_devices_status(&mut *tx, &[id], status)
            .await
            .map_err(|e| AppError::internal("Failed to update status", e))?;
        radius::sync(&mut tx, &device.mac_address, status, &device.ssid_list(), self.ssid_mode).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::internal("Failed to update status", e))?;

        device.status = status;
        tracing::info!("Device {} is now {}", device.mac_address, status.as_str());
        self.changed(&device);
        Ok(device)
    }

    /// Returns how many devices were updated; unknown ids are skipped
    pub async fn set_status_many(&self, ids: &[i64], status: DeviceStatus) -> ApiResult<u64> {
        let (_guard, devices) = self.lock_devices(ids, None).await?;
        if devices.is_empty() {
            return Ok(0);
        }
        let found: Vec<i64> = devices.iter().map(|d| d.id).collect();

        let mut tx = self.begin().await?;
        let updated = queries::update_devices_status(&mut *tx, &found, status)
            .await
            .map_err(|e| AppError::internal("Bulk update failed", e))?;
        for device in &devices {
            radius::sync(&mut tx, &device.mac_address, status, &device.ssid_list(), self.ssid_mode).await?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::internal("Bulk update failed", e))?;

        tracing::info!("Bulk status: {} device(s) set to {}", updated, status.as_str());
        for mut device in devices {
            device.status = status;
            self.changed(&device);
        }
        Ok(updated)
    }

    /// Group is metadata only, no RADIUS rows depend on it. The MAC locks are
    /// still taken so a concurrent update cannot overwrite the new group.
    pub async fn set_group_many(&self, ids: &[i64], group_name: Option<String>) -> ApiResult<u64> {
        let group = non_empty(group_name);
        let (_guard, devices) = self.lock_devices(ids, None).await?;
        if devices.is_empty() {
            return Ok(0);
        }
        let found: Vec<i64> = devices.iter().map(|d| d.id).collect();

        let mut tx = self.begin().await?;
        let updated = queries::update_devices_group(&mut *tx, &found, group.as_deref())
            .await
            .map_err(|e| AppError::internal("Bulk group update failed", e))?;
        tx.commit()
            .await
            .map_err(|e| AppError::internal("Bulk group update failed", e))?;

        tracing::info!("Bulk group: {} device(s) moved to {:?}", updated, group);
        for mut device in devices {
            device.group_name = group.clone();
            self.changed(&device);
        }
        Ok(updated)
    }

    /// Delete devices and their RADIUS rules. Unknown ids are ignored.
    pub async fn delete_many(&self, ids: &[i64]) -> ApiResult<u64> {
        let (_guard, devices) = self.lock_devices(ids, None).await?;
        if devices.is_empty() {
            return Ok(0);
        }
        let found: Vec<i64> = devices.iter().map(|d| d.id).collect();

        let mut tx = self.begin().await?;
        for device in &devices {
            radius::remove(&mut tx, &device.mac_address).await?;
        }
        let deleted = queries::delete_devices(&mut *tx, &found)
            .await
            .map_err(|e| AppError::internal("Failed to delete devices", e))?;
        tx.commit()
            .await
            .map_err(|e| AppError::internal("Failed to delete devices", e))?;

        tracing::info!("Deleted {} device(s) and their RADIUS rules", deleted);
        self.removed(found);
        Ok(deleted)
    }

    /// The `radcheck` rows currently stored for a device
    pub async fn policy(&self, id: i64) -> ApiResult<Vec<RadCheckRule>> {
        let device = queries::get_device(&self.pool, id)
            .await
            .map_err(|e| AppError::internal("Failed to load device", e))?
            .ok_or_else(|| AppError::not_found("Device not found"))?;
        queries::rules_for(&self.pool, &device.mac_address)
            .await
            .map_err(|e| AppError::internal("Failed to load policy", e))
    }
}
