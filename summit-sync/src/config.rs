//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the mutator and the realtime bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-write timeout (ms). `None` leaves timeouts to the adapter.
    pub write_timeout_ms: Option<u64>,
    /// Capacity of each realtime subscription channel.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: Some(30_000),
            event_buffer: 256,
        }
    }
}

impl SyncConfig {
    /// Per-write timeout as a duration.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
