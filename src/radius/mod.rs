//! RADIUS policy for managed devices.
//!
//! FreeRADIUS reads `radcheck` at authentication time, so the rows stored for
//! a MAC are the complete policy for it. Every write here replaces the whole
//! rule set for one MAC: delete everything keyed by the MAC, then insert the
//! rules derived from the device state.
//!
//! Callers run [`sync`] and [`remove`] inside a transaction while holding the
//! MAC's entry in [`locks::MacLocks`], so a replace is atomic and two replaces
//! of the same MAC never interleave.

pub mod locks;

use sqlx::SqliteConnection;
use thiserror::Error;

use crate::config::SsidMatchMode;
use crate::db::models::{DeviceStatus, RadCheckRule};
use crate::db::queries;

pub const ATTR_AUTH_TYPE: &str = "Auth-Type";
pub const ATTR_CLEARTEXT_PASSWORD: &str = "Cleartext-Password";
pub const ATTR_CALLED_STATION_ID: &str = "Called-Station-Id";

const OP_SET: &str = ":=";
const OP_REGEX: &str = "=~";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid SSID pattern: {0}")]
    InvalidSsidPattern(String),
    #[error("RADIUS policy sync failed: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Characters with meaning in both POSIX ERE and PCRE
const SSID_METACHARS: &[char] = &['\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$'];

fn escape_ssid(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if SSID_METACHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `Called-Station-Id` is `AP_MAC:SSID`, so the pattern anchors `:<ssid>` at
/// the end. `None` when the list is empty (every SSID allowed).
pub fn ssid_pattern(ssids: &[String], mode: SsidMatchMode) -> Result<Option<String>, SyncError> {
    if ssids.is_empty() {
        return Ok(None);
    }
    let alternatives: Vec<String> = ssids
        .iter()
        .map(|s| match mode {
            SsidMatchMode::Literal => format!(":{}", escape_ssid(s)),
            SsidMatchMode::Regex => format!(":{}", s),
        })
        .collect();
    let pattern = format!("({})$", alternatives.join("|"));

    if mode == SsidMatchMode::Regex {
        regex::Regex::new(&pattern).map_err(|e| SyncError::InvalidSsidPattern(e.to_string()))?;
    }
    Ok(Some(pattern))
}

/// The rules a MAC should have for the given state
pub fn build_rules(
    mac: &str,
    status: DeviceStatus,
    ssids: &[String],
    mode: SsidMatchMode,
) -> Result<Vec<RadCheckRule>, SyncError> {
    let rule = |attribute: &str, op: &str, value: String| RadCheckRule {
        username: mac.to_string(),
        attribute: attribute.to_string(),
        op: op.to_string(),
        value,
    };

    let rules = match status {
        DeviceStatus::Blocked => vec![rule(ATTR_AUTH_TYPE, OP_SET, "Reject".into())],
        DeviceStatus::Allowed => {
            let mut rules = vec![rule(ATTR_CLEARTEXT_PASSWORD, OP_SET, mac.to_string())];
            if let Some(pattern) = ssid_pattern(ssids, mode)? {
                rules.push(rule(ATTR_CALLED_STATION_ID, OP_REGEX, pattern));
            }
            rules
        }
    };
    Ok(rules)
}

/// Replace the policy rows of `mac` with the rules for `status`/`ssids`.
/// Safe to re-run from any state.
pub async fn sync(
    conn: &mut SqliteConnection,
    mac: &str,
    status: DeviceStatus,
    ssids: &[String],
    mode: SsidMatchMode,
) -> Result<Vec<RadCheckRule>, SyncError> {
    // Build first so a bad pattern never leaves the MAC without rules
    let rules = build_rules(mac, status, ssids, mode)?;

    queries::delete_rules_for(&mut *conn, mac).await?;
    for rule in &rules {
        queries::insert_rule(&mut *conn, rule).await?;
    }

    tracing::debug!(mac, status = status.as_str(), rules = rules.len(), "radcheck synced");
    Ok(rules)
}

/// Drop every policy row of `mac`
pub async fn remove(conn: &mut SqliteConnection, mac: &str) -> Result<u64, SyncError> {
    let removed = queries::delete_rules_for(&mut *conn, mac).await?;
    tracing::debug!(mac, removed, "radcheck rows removed");
    Ok(removed)
}
