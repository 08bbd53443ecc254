//! Per-fingerprint single-flight claims
//!
//! Within one orchestrator at most one run per fingerprint is past CHECKING.
//! Duplicates wait for the claim and then re-check the store, which normally
//! ends them as SKIPPED. Runs in other processes are not covered; there the
//! store's conditional write still decides.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::fingerprint::Fingerprint;

/// One lock per fingerprint with a run in flight
///
/// Entries are created on first claim and removed by the last holder.
#[derive(Debug, Default)]
pub struct FlightGroup {
    flights: DashMap<Fingerprint, Arc<Mutex<()>>>,
}

impl FlightGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `key`, then hold it
    ///
    /// The claim is released when the returned value is dropped, including
    /// when the owning future is cancelled.
    pub async fn claim(&self, key: &Fingerprint) -> FlightClaim<'_> {
        // Cloned under the shard lock, so `release` sees every waiter.
        let lock = self
            .flights
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        FlightClaim {
            group: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Fingerprints currently claimed or waited on
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    fn release(&self, key: &Fingerprint, guard: OwnedMutexGuard<()>) {
        // The map and the guard hold the only references when nobody waits.
        self.flights
            .remove_if(key, |_, lock| Arc::strong_count(lock) <= 2);
        drop(guard);
    }
}

/// Held while a run may render or persist its fingerprint
#[derive(Debug)]
pub struct FlightClaim<'a> {
    group: &'a FlightGroup,
    key: Fingerprint,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightClaim<'_> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.group.release(&self.key, guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(raw: &str) -> Fingerprint {
        serde_json::from_str(&format!("\"{raw}\"")).expect("fingerprint")
    }

    #[tokio::test]
    async fn second_claim_waits_for_the_first() {
        let group = Arc::new(FlightGroup::new());
        let first = group.claim(&key("a.html")).await;

        let waiter = tokio::spawn({
            let group = Arc::clone(&group);
            async move {
                let _claim = group.claim(&key("a.html")).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should get the claim")
            .expect("waiter task");
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let group = FlightGroup::new();
        let _a = group.claim(&key("a.html")).await;
        let _b = tokio::time::timeout(Duration::from_secs(1), group.claim(&key("b.html")))
            .await
            .expect("independent key");
        assert_eq!(group.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_waiter_leaves_no_entry_behind() {
        let group = FlightGroup::new();
        let first = group.claim(&key("a.html")).await;
        let waited =
            tokio::time::timeout(Duration::from_millis(10), group.claim(&key("a.html"))).await;
        assert!(waited.is_err());

        drop(first);
        assert!(group.is_empty());
    }
}
