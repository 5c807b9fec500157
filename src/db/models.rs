use serde::{Deserialize, Serialize};

// ─── Managed device ─────────────────────────────────────────────────────────

/// Admin-side state of a device; `radcheck` is kept in line with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeviceStatus {
    Allowed,
    Blocked,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Allowed => "allowed",
            DeviceStatus::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allowed" => Some(DeviceStatus::Allowed),
            "blocked" => Some(DeviceStatus::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ManagedDevice {
    pub id: i64,
    pub mac_address: String, // canonical AA-BB-CC-DD-EE-FF
    pub alias: String,
    pub group_name: Option<String>,
    pub status: DeviceStatus,
    pub allowed_ssids: Option<String>, // comma separated, NULL = every SSID
    pub created_at: String,
}

impl ManagedDevice {
    /// Trimmed, non-empty SSID names from `allowed_ssids`
    pub fn ssid_list(&self) -> Vec<String> {
        split_ssids(self.allowed_ssids.as_deref())
    }
}

pub fn split_ssids(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

// ─── Access point ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessPoint {
    pub id: i64,
    pub mac_address: String,
    pub name: String,
    pub location: String,
}

/// Access point plus its live client count
#[derive(Debug, Clone, Serialize)]
pub struct AccessPointLoad {
    #[serde(flatten)]
    pub access_point: AccessPoint,
    pub active_clients: i64,
}

// ─── RADIUS ─────────────────────────────────────────────────────────────────

/// One `radcheck` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RadCheckRule {
    pub username: String,
    pub attribute: String,
    pub op: String,
    pub value: String,
}

/// Active accounting sessions grouped by station id
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StationSessionCount {
    pub calledstationid: String,
    pub sessions: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OnlineSession {
    pub username: String,
    pub mac_address: String,
    pub ap_ssid: String,
    pub nasipaddress: String,
    pub ip_address: String,
    pub start_time: Option<String>,
    pub ap_name: Option<String>,
    pub ssid: String,
    pub alias: Option<String>,
    pub group_name: Option<String>,
    pub status: Option<String>,
}

// ─── Portal admin ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortalAdmin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

/// What the users API exposes (never the hash)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminSummary {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

// ─── Listing helpers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Pagination { total, page, limit, total_pages }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssid_list_ignores_blanks() {
        assert_eq!(split_ssids(Some(" Staff, ,Guest ,")), vec!["Staff", "Guest"]);
        assert!(split_ssids(Some("  ")).is_empty());
        assert!(split_ssids(None).is_empty());
    }

    #[test]
    fn pagination_rounds_up() {
        let p = Pagination::new(61, 2, 30);
        assert_eq!(p.total_pages, 3);
        assert_eq!(Pagination::new(0, 1, 30).total_pages, 0);
    }
}
