//! Per-AP client counts from live accounting data.
//!
//! `radacct.calledstationid` is `AP_MAC:SSID` (or just `AP_MAC`). Sessions are
//! keyed by the stripped hex form of the AP MAC, summed across every SSID the
//! AP broadcasts, then matched against the registered access points. APs seen
//! only in traffic are registered as "Unknown AP".

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::db::models::{AccessPoint, AccessPointLoad, StationSessionCount};
use crate::db::queries;
use crate::mac;
use crate::ws::LiveEvent;

pub const UNKNOWN_AP_NAME: &str = "Unknown AP";

/// Hex digits of the AP part of a station id; may be short or empty
pub fn station_ap_key(called_station_id: &str) -> String {
    let prefix = called_station_id.split(':').next().unwrap_or_default();
    mac::strip_to_hex(prefix)
}

/// Active session count per AP key, in first-seen order
#[derive(Debug, Default)]
pub struct SessionTally {
    order: Vec<String>,
    counts: HashMap<String, i64>,
}

impl SessionTally {
    pub fn from_stations(rows: &[StationSessionCount]) -> Self {
        let mut tally = SessionTally::default();
        for row in rows {
            let key = station_ap_key(&row.calledstationid);
            if key.is_empty() {
                tracing::debug!(station = %row.calledstationid, "no AP MAC in station id, skipped");
                continue;
            }
            tally.add(key, row.sessions);
        }
        tally
    }

    fn add(&mut self, key: String, sessions: i64) {
        match self.counts.get_mut(&key) {
            Some(count) => *count += sessions,
            None => {
                self.order.push(key.clone());
                self.counts.insert(key, sessions);
            }
        }
    }

    pub fn count_for(&self, key: &str) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Keys in first-seen order with their totals
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.order.iter().map(|k| (k.as_str(), self.counts[k]))
    }
}

/// Pure merge step: registered APs with their counts, plus the keys that
/// matched no registered AP (in encounter order).
pub fn merge(registered: Vec<AccessPoint>, tally: &SessionTally) -> (Vec<AccessPointLoad>, Vec<(String, i64)>) {
    let mut known = std::collections::HashSet::new();
    let loads = registered
        .into_iter()
        .map(|ap| {
            let key = mac::strip_to_hex(&ap.mac_address);
            let active_clients = tally.count_for(&key);
            known.insert(key);
            AccessPointLoad { access_point: ap, active_clients }
        })
        .collect();

    let unknown = tally
        .iter()
        .filter(|(key, _)| !known.contains(*key))
        .map(|(key, count)| (key.to_string(), count))
        .collect();

    (loads, unknown)
}

/// Every registered AP with its active client count, followed by APs first
/// seen in accounting data (which get registered on the way).
pub async fn access_point_loads(
    pool: &SqlitePool,
    events: &broadcast::Sender<LiveEvent>,
) -> Result<Vec<AccessPointLoad>> {
    let registered = queries::list_access_points(pool).await?;
    let stations = queries::active_sessions_by_station(pool).await?;
    let tally = SessionTally::from_stations(&stations);

    let (mut loads, unknown) = merge(registered, &tally);

    for (key, count) in unknown {
        let Some(canonical) = mac::from_hex(&key) else {
            tracing::debug!(ap_key = %key, "malformed AP MAC in accounting data, not registered");
            continue;
        };
        match register_unknown(pool, &canonical, events).await {
            Ok(Some(access_point)) => loads.push(AccessPointLoad {
                access_point,
                active_clients: count,
            }),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to auto-register AP {}: {}", canonical, e),
        }
    }

    Ok(loads)
}

/// Register an AP first seen in traffic. A concurrent registration of the
/// same MAC is not an error: the stored row is returned instead.
async fn register_unknown(
    pool: &SqlitePool,
    mac: &str,
    events: &broadcast::Sender<LiveEvent>,
) -> Result<Option<AccessPoint>> {
    let created = queries::insert_access_point_if_absent(pool, mac, UNKNOWN_AP_NAME, "").await?;
    let stored = queries::get_access_point_by_mac(pool, mac).await?;

    if created {
        if let Some(ap) = &stored {
            tracing::info!("Auto-registered access point {} from accounting data", mac);
            let _ = events.send(LiveEvent::AccessPointRegistered {
                access_point: ap.clone(),
                auto: true,
            });
        }
    }
    Ok(stored)
}

/// Active session count per AP name, busiest first. Sessions on unregistered
/// or malformed AP MACs fall under "Unknown AP".
pub fn distribution_by_name(registered: &[AccessPoint], tally: &SessionTally) -> Vec<(String, i64)> {
    let names: HashMap<String, &str> = registered
        .iter()
        .map(|ap| (mac::strip_to_hex(&ap.mac_address), ap.name.as_str()))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, i64> = HashMap::new();
    for (key, count) in tally.iter() {
        let name = names.get(key).copied().unwrap_or(UNKNOWN_AP_NAME).to_string();
        if !totals.contains_key(&name) {
            order.push(name.clone());
        }
        *totals.entry(name).or_insert(0) += count;
    }

    let mut dist: Vec<(String, i64)> = order
        .into_iter()
        .map(|name| {
            let count = totals[&name];
            (name, count)
        })
        .collect();
    // stable: ties keep first-seen order
    dist.sort_by(|a, b| b.1.cmp(&a.1));
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn station(id: &str, sessions: i64) -> StationSessionCount {
        StationSessionCount {
            calledstationid: id.into(),
            sessions,
        }
    }

    async fn add_session(pool: &SqlitePool, called: &str, active: bool) {
        sqlx::query(
            "INSERT INTO radacct (username, calledstationid, callingstationid, acctstoptime)
             VALUES ('u', ?, '00-00-00-00-00-01', ?)",
        )
        .bind(called)
        .bind(if active { None } else { Some("2024-01-01 00:00:00") })
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn ap_key_strips_separators_and_ssid() {
        assert_eq!(station_ap_key("aa-bb-cc-dd-ee-ff:Staff"), "AABBCCDDEEFF");
        assert_eq!(station_ap_key("AABBCCDDEEFF"), "AABBCCDDEEFF");
        assert_eq!(station_ap_key("AA-BB:Guest"), "AABB");
        assert_eq!(station_ap_key(":Guest"), "");
    }

    #[test]
    fn tally_sums_ssids_of_the_same_ap() {
        let tally = SessionTally::from_stations(&[
            station("AA-BB-CC-DD-EE-FF:Staff", 3),
            station("11-22-33-44-55-66:Staff", 1),
            station("aa-bb-cc-dd-ee-ff:Guest", 2),
        ]);
        assert_eq!(tally.count_for("AABBCCDDEEFF"), 5);
        let keys: Vec<_> = tally.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["AABBCCDDEEFF", "112233445566"]);
    }

    #[test]
    fn distribution_groups_unknowns() {
        let aps = vec![AccessPoint {
            id: 1,
            mac_address: "AA-BB-CC-DD-EE-FF".into(),
            name: "Lobby".into(),
            location: String::new(),
        }];
        let tally = SessionTally::from_stations(&[
            station("AA-BB-CC-DD-EE-FF:Staff", 1),
            station("11-22-33-44-55-66:Staff", 2),
            station("BAD:Staff", 1),
        ]);
        assert_eq!(
            distribution_by_name(&aps, &tally),
            vec![("Unknown AP".to_string(), 3), ("Lobby".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn registered_ap_counts_sessions_across_ssids() {
        let pool = test_pool().await;
        let (tx, _) = broadcast::channel(8);
        queries::insert_access_point(&pool, "AA-BB-CC-DD-EE-FF", "Lobby", "1F").await.unwrap();
        queries::insert_access_point(&pool, "00-00-00-00-00-AA", "Attic", "").await.unwrap();
        add_session(&pool, "AA-BB-CC-DD-EE-FF:Staff", true).await;
        add_session(&pool, "AA-BB-CC-DD-EE-FF:Guest", true).await;
        add_session(&pool, "AA-BB-CC-DD-EE-FF:Guest", false).await;

        let loads = access_point_loads(&pool, &tx).await.unwrap();
        assert_eq!(loads.len(), 2);
        let lobby = loads.iter().find(|l| l.access_point.name == "Lobby").unwrap();
        assert_eq!(lobby.active_clients, 2);
        let attic = loads.iter().find(|l| l.access_point.name == "Attic").unwrap();
        assert_eq!(attic.active_clients, 0);
    }

    #[tokio::test]
    async fn unknown_ap_is_registered_once() {
        let pool = test_pool().await;
        let (tx, mut rx) = broadcast::channel(8);
        add_session(&pool, "11-22-33-44-55-66:Staff", true).await;
        add_session(&pool, "112233445566", true).await;

        let first = access_point_loads(&pool, &tx).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].access_point.name, UNKNOWN_AP_NAME);
        assert_eq!(first[0].access_point.mac_address, "11-22-33-44-55-66");
        assert_eq!(first[0].active_clients, 2);
        assert!(matches!(rx.try_recv(), Ok(LiveEvent::AccessPointRegistered { auto: true, .. })));

        let second = access_point_loads(&pool, &tx).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].access_point.id, first[0].access_point.id);
        assert_eq!(queries::list_access_points(&pool).await.unwrap().len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_and_inactive_stations_register_nothing() {
        let pool = test_pool().await;
        let (tx, _) = broadcast::channel(8);
        add_session(&pool, "AB-CD:Staff", true).await;
        add_session(&pool, "99-99-99-99-99-99:Staff", false).await;

        let loads = access_point_loads(&pool, &tx).await.unwrap();
        assert!(loads.is_empty());
        assert!(queries::list_access_points(&pool).await.unwrap().is_empty());
    }
}
