//! Status registry.
//!
//! External reporters upsert one entry per key. Reads of health keys apply a
//! staleness window: a report older than the window reads as `offline`, since
//! a reporter that died cannot say so. Reads never fail; a store error reads
//! as `unknown`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::StatusConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::Store;
use crate::types::{StatusEntry, StatusReading};

/// Key the workflow daemon reports its health under
pub const DAEMON_HEALTH_KEY: &str = "daemon_health";

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";
pub const UNKNOWN: &str = "unknown";

/// Effective status of a stored entry at `now`.
///
/// Stale means strictly older than `stale_after`.
pub fn effective_status<'a>(
    entry: &'a StatusEntry,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> &'a str {
    if now - entry.updated_at > stale_after {
        OFFLINE
    } else {
        &entry.status
    }
}

/// Reading for a key that was never reported
fn unknown_reading(key: &str) -> StatusReading {
    StatusReading {
        key: key.to_string(),
        status: UNKNOWN.to_string(),
        updated_at: None,
        details: None,
    }
}

/// Key/value health entries with derived effective status
#[derive(Clone)]
pub struct StatusRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
    health_keys: HashSet<String>,
}

impl StatusRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &StatusConfig) -> Self {
        Self {
            store,
            clock,
            stale_after: config.stale_after(),
            health_keys: config.health_keys.iter().cloned().collect(),
        }
    }

    /// Record a status for `key` as of now. Returns the entry id, which is
    /// stable across updates.
    pub async fn upsert(
        &self,
        key: &str,
        status: &str,
        details: Option<String>,
    ) -> WorkflowResult<Uuid> {
        self.report(key, status, details, None).await
    }

    /// Record a status as of `reported_at` (defaults to now). A report older
    /// than the stored one is ignored.
    pub async fn report(
        &self,
        key: &str,
        status: &str,
        details: Option<String>,
        reported_at: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Uuid> {
        let key = key.trim();
        if key.is_empty() {
            return Err(WorkflowError::invalid_input("status key is required"));
        }
        if status.trim().is_empty() {
            return Err(WorkflowError::invalid_input("status value is required"));
        }

        let updated_at = reported_at.unwrap_or_else(|| self.clock.now());
        let id = self
            .store
            .upsert_status(key, status.trim(), details, updated_at)
            .await?;
        debug!(key = %key, status = %status, "Status reported");
        Ok(id)
    }

    /// Current reading for `key`
    pub async fn read(&self, key: &str) -> StatusReading {
        match self.store.status_entry(key).await {
            Ok(Some(entry)) => self.reading(&entry),
            Ok(None) => unknown_reading(key),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read status entry");
                unknown_reading(key)
            }
        }
    }

    /// Reading for the workflow daemon's health key
    pub async fn daemon_status(&self) -> StatusReading {
        self.read(DAEMON_HEALTH_KEY).await
    }

    /// Readings for every reported key, sorted by key
    pub async fn list(&self) -> Vec<StatusReading> {
        let mut entries = match self.store.status_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list status entries");
                return Vec::new();
            }
        };
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.iter().map(|entry| self.reading(entry)).collect()
    }

    fn reading(&self, entry: &StatusEntry) -> StatusReading {
        let status = if self.health_keys.contains(&entry.key) {
            effective_status(entry, self.clock.now(), self.stale_after)
        } else {
            entry.status.as_str()
        };
        StatusReading {
            key: entry.key.clone(),
            status: status.to_string(),
            updated_at: Some(entry.updated_at),
            details: entry.details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn make_registry() -> (StatusRegistry, Arc<ManualClock>) {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let registry = StatusRegistry::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            &StatusConfig::default(),
        );
        (registry, clock)
    }

    #[tokio::test]
    async fn test_staleness_boundary() {
        let (registry, clock) = make_registry();
        registry
            .upsert(DAEMON_HEALTH_KEY, ONLINE, None)
            .await
            .unwrap();

        clock.advance(Duration::seconds(179));
        assert_eq!(registry.daemon_status().await.status, ONLINE);

        clock.advance(Duration::seconds(1));
        assert_eq!(registry.daemon_status().await.status, ONLINE);

        clock.advance(Duration::seconds(1));
        let reading = registry.daemon_status().await;
        assert_eq!(reading.status, OFFLINE);
        assert!(reading.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_key_is_unknown() {
        let (registry, _) = make_registry();
        let reading = registry.daemon_status().await;
        assert_eq!(reading.status, UNKNOWN);
        assert!(reading.updated_at.is_none());
        assert!(reading.details.is_none());
    }

    #[tokio::test]
    async fn test_upsert_round_trip_keeps_id() {
        let (registry, clock) = make_registry();
        let id = registry
            .upsert(DAEMON_HEALTH_KEY, ONLINE, Some("pid 42".to_string()))
            .await
            .unwrap();

        let reading = registry.daemon_status().await;
        assert_eq!(reading.status, ONLINE);
        assert_eq!(reading.details.as_deref(), Some("pid 42"));
        assert_eq!(reading.updated_at, Some(clock.now()));

        clock.advance(Duration::seconds(60));
        let again = registry
            .upsert(DAEMON_HEALTH_KEY, OFFLINE, None)
            .await
            .unwrap();
        assert_eq!(id, again);
        assert_eq!(registry.daemon_status().await.status, OFFLINE);
    }

    #[tokio::test]
    async fn test_non_health_keys_never_go_stale() {
        let (registry, clock) = make_registry();
        registry.upsert("cron_sync", "ok", None).await.unwrap();
        clock.advance(Duration::hours(2));

        assert_eq!(registry.read("cron_sync").await.status, "ok");
        let all = registry.list().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "cron_sync");
    }

    #[tokio::test]
    async fn test_delayed_report_is_ignored() {
        let (registry, clock) = make_registry();
        let t0 = clock.now();
        registry
            .upsert(DAEMON_HEALTH_KEY, OFFLINE, Some("stopped".to_string()))
            .await
            .unwrap();

        registry
            .report(
                DAEMON_HEALTH_KEY,
                ONLINE,
                None,
                Some(t0 - Duration::seconds(30)),
            )
            .await
            .unwrap();

        let reading = registry.daemon_status().await;
        assert_eq!(reading.status, OFFLINE);
        assert_eq!(reading.details.as_deref(), Some("stopped"));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let (registry, _) = make_registry();
        let err = registry.upsert(" ", ONLINE, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }
}
