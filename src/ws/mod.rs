use serde::{Deserialize, Serialize};

use crate::db::models::{AccessPoint, ManagedDevice};

/// Events pushed to connected dashboards so their tables refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A device was created or its state/policy changed
    DeviceChanged { device: ManagedDevice },
    /// Devices (and their RADIUS rules) were deleted
    DevicesRemoved { ids: Vec<i64> },
    /// An access point was registered, by an operator or from accounting traffic
    AccessPointRegistered {
        access_point: AccessPoint,
        auto: bool,
    },
    AccessPointRemoved { id: i64 },
    /// The client fell behind and missed events; it should refetch everything
    Resync { skipped: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_are_tagged_by_type() {
        let removed = serde_json::to_value(LiveEvent::DevicesRemoved { ids: vec![3, 7] }).unwrap();
        assert_eq!(removed, json!({ "type": "devices_removed", "ids": [3, 7] }));

        let resync = serde_json::to_value(LiveEvent::Resync { skipped: 12 }).unwrap();
        assert_eq!(resync, json!({ "type": "resync", "skipped": 12 }));

        let parsed: LiveEvent =
            serde_json::from_value(json!({ "type": "access_point_removed", "id": 4 })).unwrap();
        assert!(matches!(parsed, LiveEvent::AccessPointRemoved { id: 4 }));
    }
}
