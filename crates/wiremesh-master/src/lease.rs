//! The leader lease.
//!
//! Mastership is a single TTL-bounded key in the shared store. Every
//! candidate runs two periodic loops:
//!
//! - **upgrade**: while not master, try to acquire the key with
//!   `SET NX EX`; acquiring it promotes this node.
//! - **maintain**: while master, refresh the key's TTL with `EXPIRE`; a
//!   missing key or a store error demotes this node.
//!
//! The TTL (10 s) exceeds the refresh period (5 s), so a healthy master
//! always refreshes before expiry. A partitioned master misses refreshes,
//! demotes itself, and the expired key frees the lease for the next
//! candidate's upgrade tick.
//!
//! This is a fail-stop lease, not consensus: it assumes honest clocks and
//! tolerates crashes, nothing stronger.

use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use wiremesh_store::{keys, Store, StoreError};

/// How often a candidate attempts to acquire the lease.
pub const UPGRADE_PERIOD: Duration = Duration::from_secs(5);

/// How often the holder refreshes the lease.
pub const MAINTAIN_PERIOD: Duration = Duration::from_secs(5);

/// Lease TTL in seconds; must exceed the refresh period.
pub const MASTER_KEY_EXPIRES: i64 = 10;

/// This node's view of the lease.
pub struct Lease {
    master: RwLock<bool>,
}

impl Lease {
    /// Create a lease view; every node starts as a non-master candidate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            master: RwLock::new(false),
        }
    }

    /// Whether this node currently believes it holds the lease.
    pub async fn is_master(&self) -> bool {
        *self.master.read().await
    }

    /// One upgrade tick: while not master, try to acquire the lease key.
    pub async fn upgrade(&self, store: &Store) {
        let mut master = self.master.write().await;
        if *master {
            return;
        }

        tracing::debug!("attempting to acquire master lease");

        match store
            .set_if_absent_ttl(keys::MASTER_LEASE_KEY, "1", MASTER_KEY_EXPIRES)
            .await
        {
            Ok(acquired) => {
                *master = apply_upgrade(*master, acquired);
                if *master {
                    tracing::info!("acquired master lease, node is now master");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "master lease acquire failed");
            }
        }
    }

    /// One maintain tick: while master, refresh the lease TTL; failure or a
    /// missing key demotes.
    pub async fn maintain(&self, store: &Store) {
        let mut master = self.master.write().await;
        if !*master {
            return;
        }

        let refreshed = store
            .expire(keys::MASTER_LEASE_KEY, MASTER_KEY_EXPIRES)
            .await;

        match &refreshed {
            Ok(true) => {}
            Ok(false) => tracing::warn!("master lease key missing, demoting"),
            Err(err) => tracing::warn!(error = %err, "master lease refresh failed, demoting"),
        }

        *master = apply_maintain(*master, &refreshed);
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrade transition: a non-master becomes master iff it acquired the key.
fn apply_upgrade(master: bool, acquired: bool) -> bool {
    master || acquired
}

/// Maintain transition: a master stays master iff the refresh observed the
/// key; a store error also demotes.
fn apply_maintain(master: bool, refreshed: &Result<bool, StoreError>) -> bool {
    master && matches!(refreshed, Ok(true))
}

/// Run the upgrade loop until the token fires.
pub async fn run_upgrade_loop(
    lease: std::sync::Arc<Lease>,
    store: Store,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + UPGRADE_PERIOD, UPGRADE_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => lease.upgrade(&store).await,
        }
    }
}

/// Run the maintain loop until the token fires.
pub async fn run_maintain_loop(
    lease: std::sync::Arc<Lease>,
    store: Store,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + MAINTAIN_PERIOD, MAINTAIN_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => lease.maintain(&store).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_err() -> StoreError {
        StoreError::InvalidAddress("test".to_string())
    }

    #[test]
    fn ttl_exceeds_refresh_period() {
        assert!(u64::try_from(MASTER_KEY_EXPIRES).unwrap() > MAINTAIN_PERIOD.as_secs());
    }

    #[test]
    fn candidate_promotes_on_acquire() {
        assert!(apply_upgrade(false, true));
        assert!(!apply_upgrade(false, false));
    }

    #[test]
    fn master_ignores_upgrade() {
        assert!(apply_upgrade(true, false));
        assert!(apply_upgrade(true, true));
    }

    #[test]
    fn master_stays_on_successful_refresh() {
        assert!(apply_maintain(true, &Ok(true)));
    }

    #[test]
    fn master_demotes_on_missing_key() {
        assert!(!apply_maintain(true, &Ok(false)));
    }

    #[test]
    fn master_demotes_on_store_error() {
        assert!(!apply_maintain(true, &Err(store_err())));
    }

    #[test]
    fn candidate_stays_candidate_through_maintain() {
        assert!(!apply_maintain(false, &Ok(true)));
        assert!(!apply_maintain(false, &Ok(false)));
    }

    #[test]
    fn contention_promotes_exactly_one() {
        // Two candidates race an absent lock key; the store grants the
        // atomic SET NX to exactly one of them.
        let first = apply_upgrade(false, true);
        let second = apply_upgrade(false, false);
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn lease_loss_then_reacquire_elsewhere() {
        // A partitioned master fails its refresh and demotes.
        let partitioned = apply_maintain(true, &Err(store_err()));
        assert!(!partitioned);

        // After the key expires, another candidate's upgrade acquires.
        let successor = apply_upgrade(false, true);
        assert!(successor);
    }

    #[tokio::test]
    async fn lease_starts_as_candidate() {
        let lease = Lease::new();
        assert!(!lease.is_master().await);
    }
}
