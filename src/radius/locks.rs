use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per MAC address.
///
/// Policy rewrites for a MAC hold its entry for the whole transaction. Locks
/// for several MACs are always taken in sorted order so two bulk operations
/// over overlapping sets cannot deadlock.
#[derive(Debug, Default)]
pub struct MacLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct MacGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl MacLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, mac: &str) -> MacGuard {
        self.lock_many([mac]).await
    }

    pub async fn lock_many<'a, I>(&self, macs: I) -> MacGuard
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ordered: BTreeSet<&str> = macs.into_iter().collect();
        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on only carry the map's own reference
            table.retain(|_, m| Arc::strong_count(m) > 1);
            ordered
                .iter()
                .map(|mac| table.entry(mac.to_string()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for m in mutexes {
            guards.push(m.lock_owned().await);
        }
        MacGuard { _guards: guards }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_mac_is_serialized() {
        let locks = Arc::new(MacLocks::new());
        let guard = locks.lock("AA-BB-CC-DD-EE-FF").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("AA-BB-CC-DD-EE-FF").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_macs_do_not_block_each_other() {
        let locks = MacLocks::new();
        let _a = locks.lock("AA-AA-AA-AA-AA-AA").await;
        tokio::time::timeout(Duration::from_millis(200), locks.lock("BB-BB-BB-BB-BB-BB"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_macs_in_one_request_do_not_self_deadlock() {
        let locks = MacLocks::new();
        tokio::time::timeout(
            Duration::from_millis(200),
            locks.lock_many(["AA-AA-AA-AA-AA-AA", "AA-AA-AA-AA-AA-AA"]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = MacLocks::new();
        drop(locks.lock_many(["AA-AA-AA-AA-AA-AA", "BB-BB-BB-BB-BB-BB"]).await);
        let _held = locks.lock("CC-CC-CC-CC-CC-CC").await;
        assert_eq!(locks.tracked(), 1);
    }
}
