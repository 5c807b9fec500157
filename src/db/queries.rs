use anyhow::Result;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use super::models::{
    AccessPoint, AdminSummary, DeviceStatus, ManagedDevice, OnlineSession, Page, Pagination,
    PortalAdmin, RadCheckRule, StationSessionCount,
};

const DEFAULT_PAGE_SIZE: i64 = 30;
const MAX_PAGE_SIZE: i64 = 500;

// ─── Listing parameters ───────────────────────────────────────────────────────

/// `?page&limit&search&searchType&sortKey&sortDir`, shared by the device and
/// online-session listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub search_type: Option<String>,
    pub sort_key: Option<String>,
    pub sort_dir: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Saturates for absurd page numbers; SQLite then returns an empty page
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    fn like_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s))
    }

    fn search_type(&self) -> &str {
        self.search_type.as_deref().unwrap_or("all")
    }

    fn direction(&self) -> &'static str {
        match self.sort_dir.as_deref() {
            Some(d) if d.eq_ignore_ascii_case("asc") => "ASC",
            _ => "DESC",
        }
    }
}

// ─── Device queries ──────────────────────────────────────────────────────────

const DEVICE_COLUMNS: &str =
    "id, mac_address, alias, group_name, status, allowed_ssids, created_at";

fn push_device_filter(qb: &mut QueryBuilder<'_, Sqlite>, params: &ListQuery) {
    let Some(like) = params.like_term() else {
        return;
    };
    qb.push(" WHERE ");
    match params.search_type() {
        "mac" => {
            qb.push("mac_address LIKE ").push_bind(like);
        }
        "alias" => {
            qb.push("alias LIKE ").push_bind(like);
        }
        "group" => {
            qb.push("group_name LIKE ").push_bind(like);
        }
        _ => {
            qb.push("(mac_address LIKE ")
                .push_bind(like.clone())
                .push(" OR alias LIKE ")
                .push_bind(like.clone())
                .push(" OR group_name LIKE ")
                .push_bind(like)
                .push(")");
        }
    }
}

fn device_sort_column(key: Option<&str>) -> &'static str {
    match key {
        Some("mac_address") => "mac_address",
        Some("alias") => "alias",
        Some("group_name") => "group_name",
        Some("status") => "status",
        _ => "created_at",
    }
}

pub async fn list_devices(pool: &SqlitePool, params: &ListQuery) -> Result<Page<ManagedDevice>> {
    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM managed_devices");
    push_device_filter(&mut count_qb, params);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM managed_devices", DEVICE_COLUMNS));
    push_device_filter(&mut qb, params);
    qb.push(format!(
        " ORDER BY {} {}, id {}",
        device_sort_column(params.sort_key.as_deref()),
        params.direction(),
        params.direction()
    ));
    qb.push(" LIMIT ").push_bind(params.limit());
    qb.push(" OFFSET ").push_bind(params.offset());

    let data = qb.build_query_as::<ManagedDevice>().fetch_all(pool).await?;
    Ok(Page {
        data,
        pagination: Pagination::new(total, params.page(), params.limit()),
    })
}

pub async fn get_device(exec: impl SqliteExecutor<'_>, id: i64) -> Result<Option<ManagedDevice>> {
    let device = sqlx::query_as::<_, ManagedDevice>(&format!(
        "SELECT {} FROM managed_devices WHERE id = ?",
        DEVICE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(device)
}

pub async fn get_devices_by_ids(
    exec: impl SqliteExecutor<'_>,
    ids: &[i64],
) -> Result<Vec<ManagedDevice>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM managed_devices WHERE id IN (",
        DEVICE_COLUMNS
    ));
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(") ORDER BY id");
    let devices = qb.build_query_as::<ManagedDevice>().fetch_all(exec).await?;
    Ok(devices)
}

/// Fields of a device about to be inserted
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub mac_address: String,
    pub alias: String,
    pub group_name: Option<String>,
    pub status: DeviceStatus,
    pub allowed_ssids: Option<String>,
}

pub async fn insert_device(exec: impl SqliteExecutor<'_>, d: &NewDevice) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO managed_devices (mac_address, alias, group_name, status, allowed_ssids)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&d.mac_address)
    .bind(&d.alias)
    .bind(&d.group_name)
    .bind(d.status.as_str())
    .bind(&d.allowed_ssids)
    .execute(exec)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_device_details(exec: impl SqliteExecutor<'_>, d: &ManagedDevice) -> Result<()> {
    sqlx::query(
        "UPDATE managed_devices SET mac_address = ?, alias = ?, group_name = ?, allowed_ssids = ?
         WHERE id = ?",
    )
    .bind(&d.mac_address)
    .bind(&d.alias)
    .bind(&d.group_name)
    .bind(&d.allowed_ssids)
    .bind(d.id)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn update_devices_status(
    exec: impl SqliteExecutor<'_>,
    ids: &[i64],
    status: DeviceStatus,
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE managed_devices SET status = ");
    qb.push_bind(status.as_str()).push(" WHERE id IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    let result = qb.build().execute(exec).await?;
    Ok(result.rows_affected())
}

pub async fn update_devices_group(
    exec: impl SqliteExecutor<'_>,
    ids: &[i64],
    group_name: Option<&str>,
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE managed_devices SET group_name = ");
    qb.push_bind(group_name.map(str::to_string)).push(" WHERE id IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    let result = qb.build().execute(exec).await?;
    Ok(result.rows_affected())
}

pub async fn delete_devices(exec: impl SqliteExecutor<'_>, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM managed_devices WHERE id IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    let result = qb.build().execute(exec).await?;
    Ok(result.rows_affected())
}

/// Raw `allowed_ssids` values of every device that restricts SSIDs
pub async fn list_ssid_lists(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT allowed_ssids FROM managed_devices WHERE allowed_ssids IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

pub async fn count_devices(pool: &SqlitePool, status: Option<DeviceStatus>) -> Result<i64> {
    let (count,): (i64,) = match status {
        Some(status) => {
            sqlx::query_as("SELECT COUNT(*) FROM managed_devices WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT COUNT(*) FROM managed_devices")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

// ─── radcheck queries ────────────────────────────────────────────────────────

pub async fn delete_rules_for(exec: impl SqliteExecutor<'_>, username: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM radcheck WHERE username = ?")
        .bind(username)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_rule(exec: impl SqliteExecutor<'_>, rule: &RadCheckRule) -> Result<()> {
    sqlx::query("INSERT INTO radcheck (username, attribute, op, value) VALUES (?, ?, ?, ?)")
        .bind(&rule.username)
        .bind(&rule.attribute)
        .bind(&rule.op)
        .bind(&rule.value)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn rules_for(exec: impl SqliteExecutor<'_>, username: &str) -> Result<Vec<RadCheckRule>> {
    let rules = sqlx::query_as::<_, RadCheckRule>(
        "SELECT username, attribute, op, value FROM radcheck WHERE username = ? ORDER BY id",
    )
    .bind(username)
    .fetch_all(exec)
    .await?;
    Ok(rules)
}

// ─── Access point queries ────────────────────────────────────────────────────

pub async fn list_access_points(exec: impl SqliteExecutor<'_>) -> Result<Vec<AccessPoint>> {
    let aps = sqlx::query_as::<_, AccessPoint>(
        "SELECT id, mac_address, name, location FROM access_points ORDER BY name, id",
    )
    .fetch_all(exec)
    .await?;
    Ok(aps)
}

pub async fn get_access_point(exec: impl SqliteExecutor<'_>, id: i64) -> Result<Option<AccessPoint>> {
    let ap = sqlx::query_as::<_, AccessPoint>(
        "SELECT id, mac_address, name, location FROM access_points WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(ap)
}

pub async fn get_access_point_by_mac(
    exec: impl SqliteExecutor<'_>,
    mac: &str,
) -> Result<Option<AccessPoint>> {
    let ap = sqlx::query_as::<_, AccessPoint>(
        "SELECT id, mac_address, name, location FROM access_points WHERE mac_address = ?",
    )
    .bind(mac)
    .fetch_optional(exec)
    .await?;
    Ok(ap)
}

pub async fn insert_access_point(
    exec: impl SqliteExecutor<'_>,
    mac: &str,
    name: &str,
    location: &str,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO access_points (mac_address, name, location) VALUES (?, ?, ?)")
        .bind(mac)
        .bind(name)
        .bind(location)
        .execute(exec)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Insert unless the MAC is already registered. Returns whether a row was written.
pub async fn insert_access_point_if_absent(
    exec: impl SqliteExecutor<'_>,
    mac: &str,
    name: &str,
    location: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO access_points (mac_address, name, location) VALUES (?, ?, ?)
         ON CONFLICT(mac_address) DO NOTHING",
    )
    .bind(mac)
    .bind(name)
    .bind(location)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_access_point(
    exec: impl SqliteExecutor<'_>,
    id: i64,
    name: &str,
    location: &str,
) -> Result<bool> {
    let result = sqlx::query("UPDATE access_points SET name = ?, location = ? WHERE id = ?")
        .bind(name)
        .bind(location)
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_access_point(exec: impl SqliteExecutor<'_>, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM access_points WHERE id = ?")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ─── Accounting queries ──────────────────────────────────────────────────────

/// Active sessions grouped by raw `calledstationid`
pub async fn active_sessions_by_station(
    exec: impl SqliteExecutor<'_>,
) -> Result<Vec<StationSessionCount>> {
    let rows = sqlx::query_as::<_, StationSessionCount>(
        "SELECT calledstationid, COUNT(*) AS sessions
         FROM radacct
         WHERE acctstoptime IS NULL
         GROUP BY calledstationid
         ORDER BY MIN(radacctid)",
    )
    .fetch_all(exec)
    .await?;
    Ok(rows)
}

pub async fn count_active_sessions(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM radacct WHERE acctstoptime IS NULL")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

const AP_PREFIX_SQL: &str = "CASE WHEN instr(r.calledstationid, ':') > 0
         THEN substr(r.calledstationid, 1, instr(r.calledstationid, ':') - 1)
         ELSE r.calledstationid END";

/// SQL for the separator-free, uppercase hex of a MAC expression; the same
/// key `mac::strip_to_hex` produces for the separators seen in accounting data
fn hex_key_sql(expr: &str) -> String {
    format!(
        "upper(replace(replace(replace(replace(replace({}, '-', ''), ':', ''), '.', ''), ' ', ''), '_', ''))",
        expr
    )
}

fn online_from_clause() -> String {
    format!(
        " FROM radacct r
          LEFT JOIN access_points ap ON {ap_key} = {station_key}
          LEFT JOIN managed_devices d ON {device_key} = {calling_key}
          WHERE r.acctstoptime IS NULL",
        ap_key = hex_key_sql("ap.mac_address"),
        station_key = hex_key_sql(AP_PREFIX_SQL),
        device_key = hex_key_sql("d.mac_address"),
        calling_key = hex_key_sql("r.callingstationid"),
    )
}

fn push_session_filter(qb: &mut QueryBuilder<'_, Sqlite>, params: &ListQuery) {
    let Some(like) = params.like_term() else {
        return;
    };
    qb.push(" AND ");
    match params.search_type() {
        "mac" => {
            qb.push("r.callingstationid LIKE ").push_bind(like);
        }
        "alias" => {
            qb.push("d.alias LIKE ").push_bind(like);
        }
        "ip" => {
            qb.push("r.framedipaddress LIKE ").push_bind(like);
        }
        "group" => {
            qb.push("d.group_name LIKE ").push_bind(like);
        }
        _ => {
            qb.push("(r.callingstationid LIKE ")
                .push_bind(like.clone())
                .push(" OR r.username LIKE ")
                .push_bind(like.clone())
                .push(" OR d.alias LIKE ")
                .push_bind(like.clone())
                .push(" OR r.framedipaddress LIKE ")
                .push_bind(like.clone())
                .push(" OR d.group_name LIKE ")
                .push_bind(like)
                .push(")");
        }
    }
}

fn session_sort_column(key: Option<&str>) -> &'static str {
    match key {
        Some("alias") => "d.alias",
        Some("mac_address") => "r.callingstationid",
        Some("ip_address") => "r.framedipaddress",
        Some("ap_name") => "ap.name",
        Some("status") => "d.status",
        _ => "r.acctstarttime",
    }
}

/// Active sessions joined with AP and device metadata
pub async fn list_online_sessions(
    pool: &SqlitePool,
    params: &ListQuery,
) -> Result<Page<OnlineSession>> {
    let from = online_from_clause();

    let mut count_qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*){}", from));
    push_session_filter(&mut count_qb, params);
    let (total,): (i64,) = count_qb.build_query_as().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT r.username,
                r.callingstationid AS mac_address,
                r.calledstationid AS ap_ssid,
                r.nasipaddress,
                r.framedipaddress AS ip_address,
                r.acctstarttime AS start_time,
                ap.name AS ap_name,
                CASE WHEN instr(r.calledstationid, ':') > 0
                     THEN substr(r.calledstationid, instr(r.calledstationid, ':') + 1)
                     ELSE '' END AS ssid,
                d.alias,
                d.group_name,
                d.status{}",
        from
    ));
    push_session_filter(&mut qb, params);
    qb.push(format!(
        " ORDER BY {} {}, r.radacctid {}",
        session_sort_column(params.sort_key.as_deref()),
        params.direction(),
        params.direction()
    ));
    qb.push(" LIMIT ").push_bind(params.limit());
    qb.push(" OFFSET ").push_bind(params.offset());

    let data = qb.build_query_as::<OnlineSession>().fetch_all(pool).await?;
    Ok(Page {
        data,
        pagination: Pagination::new(total, params.page(), params.limit()),
    })
}

// ─── Portal admin queries ────────────────────────────────────────────────────

pub async fn list_admins(pool: &SqlitePool) -> Result<Vec<AdminSummary>> {
    let admins = sqlx::query_as::<_, AdminSummary>(
        "SELECT id, username, created_at FROM portal_admins ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(admins)
}

pub async fn count_admins(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM portal_admins")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_admin_by_username(pool: &SqlitePool, username: &str) -> Result<Option<PortalAdmin>> {
    let admin = sqlx::query_as::<_, PortalAdmin>(
        "SELECT id, username, password_hash, created_at FROM portal_admins WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(admin)
}

pub async fn insert_admin(pool: &SqlitePool, username: &str, password_hash: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO portal_admins (username, password_hash) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_admin_password(pool: &SqlitePool, id: i64, password_hash: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE portal_admins SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_admin(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM portal_admins WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_device(pool: &SqlitePool, mac: &str, alias: &str, group: Option<&str>) -> i64 {
        insert_device(
            pool,
            &NewDevice {
                mac_address: mac.into(),
                alias: alias.into(),
                group_name: group.map(str::to_string),
                status: DeviceStatus::Allowed,
                allowed_ssids: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn device_listing_filters_sorts_and_pages() {
        let pool = test_pool().await;
        seed_device(&pool, "00-00-00-00-00-03", "printer", Some("office")).await;
        seed_device(&pool, "00-00-00-00-00-01", "laptop", Some("staff")).await;
        seed_device(&pool, "00-00-00-00-00-02", "phone", Some("staff")).await;

        let params = ListQuery {
            search: Some("staff".into()),
            search_type: Some("group".into()),
            sort_key: Some("mac_address".into()),
            sort_dir: Some("asc".into()),
            ..Default::default()
        };
        let page = list_devices(&pool, &params).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        let macs: Vec<_> = page.data.iter().map(|d| d.mac_address.as_str()).collect();
        assert_eq!(macs, ["00-00-00-00-00-01", "00-00-00-00-00-02"]);

        let params = ListQuery {
            limit: Some(2),
            page: Some(2),
            sort_key: Some("alias".into()),
            sort_dir: Some("asc".into()),
            ..Default::default()
        };
        let page = list_devices(&pool, &params).await.unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].alias, "printer");
    }

    #[tokio::test]
    async fn unknown_sort_key_is_not_injected() {
        let pool = test_pool().await;
        seed_device(&pool, "00-00-00-00-00-01", "a", None).await;
        let params = ListQuery {
            sort_key: Some("id; DROP TABLE managed_devices".into()),
            ..Default::default()
        };
        let page = list_devices(&pool, &params).await.unwrap();
        assert_eq!(page.data.len(), 1);
    }

    #[tokio::test]
    async fn bulk_updates_report_affected_rows() {
        let pool = test_pool().await;
        let a = seed_device(&pool, "00-00-00-00-00-01", "a", None).await;
        let b = seed_device(&pool, "00-00-00-00-00-02", "b", None).await;

        assert_eq!(update_devices_status(&pool, &[a, b, 999], DeviceStatus::Blocked).await.unwrap(), 2);
        assert_eq!(count_devices(&pool, Some(DeviceStatus::Blocked)).await.unwrap(), 2);
        assert_eq!(update_devices_group(&pool, &[a], Some("lab")).await.unwrap(), 1);
        assert_eq!(get_device(&pool, a).await.unwrap().unwrap().group_name.as_deref(), Some("lab"));
        assert_eq!(delete_devices(&pool, &[a]).await.unwrap(), 1);
        assert_eq!(count_devices(&pool, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn online_sessions_join_ap_and_device() {
        let pool = test_pool().await;
        insert_access_point(&pool, "AA-BB-CC-DD-EE-FF", "Lobby", "1F").await.unwrap();
        seed_device(&pool, "11-22-33-44-55-66", "alice-phone", Some("staff")).await;
        sqlx::query(
            "INSERT INTO radacct (username, calledstationid, callingstationid, framedipaddress, acctstarttime)
             VALUES ('11-22-33-44-55-66', 'aa-bb-cc-dd-ee-ff:Staff', '11-22-33-44-55-66', '10.0.0.5', '2024-01-01 10:00:00'),
                    ('99-99-99-99-99-99', 'AA-BB-CC-DD-EE-FF:Guest', '99-99-99-99-99-99', '10.0.0.6', '2024-01-01 11:00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO radacct (username, calledstationid, callingstationid, acctstoptime)
             VALUES ('old', 'AA-BB-CC-DD-EE-FF:Staff', '00-00-00-00-00-00', '2024-01-01 09:00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let page = list_online_sessions(&pool, &ListQuery::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        // newest first
        assert_eq!(page.data[0].ssid, "Guest");
        assert_eq!(page.data[0].alias, None);
        assert_eq!(page.data[1].ap_name.as_deref(), Some("Lobby"));
        assert_eq!(page.data[1].alias.as_deref(), Some("alice-phone"));
        assert_eq!(page.data[1].status.as_deref(), Some("allowed"));

        let params = ListQuery {
            search: Some("10.0.0.6".into()),
            search_type: Some("ip".into()),
            ..Default::default()
        };
        let page = list_online_sessions(&pool, &params).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].username, "99-99-99-99-99-99");
    }

    #[tokio::test]
    async fn online_sessions_match_any_mac_spelling() {
        let pool = test_pool().await;
        insert_access_point(&pool, "AA-BB-CC-DD-EE-FF", "Lobby", "1F").await.unwrap();
        seed_device(&pool, "AA-BB-CC-00-11-22", "tablet", None).await;
        sqlx::query(
            "INSERT INTO radacct (username, calledstationid, callingstationid, acctstarttime)
             VALUES ('t', 'AABBCCDDEEFF:Staff', 'aabbcc001122', '2024-01-01 10:00:00'),
                    ('t', 'aabb.ccdd.eeff:Guest', 'aabb.cc00.1122', '2024-01-01 11:00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let page = list_online_sessions(&pool, &ListQuery::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        for session in &page.data {
            assert_eq!(session.ap_name.as_deref(), Some("Lobby"), "station {}", session.ap_ssid);
            assert_eq!(session.alias.as_deref(), Some("tablet"), "client {}", session.mac_address);
        }
        assert_eq!(page.data[1].ssid, "Staff");

        let params = ListQuery {
            search: Some("tablet".into()),
            search_type: Some("alias".into()),
            ..Default::default()
        };
        assert_eq!(list_online_sessions(&pool, &params).await.unwrap().pagination.total, 2);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let params = ListQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(params.offset(), i64::MAX);

        let params = ListQuery {
            page: Some(3),
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(params.limit(), 500);
        assert_eq!(params.offset(), 1000);
    }

    #[tokio::test]
    async fn huge_page_returns_an_empty_page() {
        let pool = test_pool().await;
        seed_device(&pool, "00-00-00-00-00-01", "a", None).await;
        let params = ListQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        let page = list_devices(&pool, &params).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 1);

        let sessions = list_online_sessions(&pool, &params).await.unwrap();
        assert!(sessions.data.is_empty());
    }
}
