//! System status entries reported by external processes

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Last reported state for a status key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct StatusEntry {
    pub id: Uuid,

    /// Unique key (e.g., "daemon_health")
    pub key: String,

    /// Reported status (e.g., "online", "offline")
    pub status: String,

    /// Optional diagnostic text
    #[serde(default)]
    pub details: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// What the dashboard sees for a key after the staleness rule is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct StatusReading {
    pub key: String,

    /// Effective status: the stored value, "offline" when stale, or
    /// "unknown" when nothing was ever reported
    pub status: String,

    pub updated_at: Option<DateTime<Utc>>,

    pub details: Option<String>,
}
