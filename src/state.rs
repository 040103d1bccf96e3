//! Persisted per-client and UPS meta state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod store;
pub mod tracker;

pub use store::{JsonFileStore, StateStore};
#[cfg(test)]
pub use store::MemoryStateStore;
pub use tracker::ClientStateTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaState {
    pub ups_on_battery: bool,
    pub battery_percent_at_shutdown: u8,
}

impl Default for MetaState {
    fn default() -> Self {
        Self {
            ups_on_battery: false,
            battery_percent_at_shutdown: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientState {
    pub was_online_before_battery: bool,
    pub is_online: bool,
    pub wol_sent: bool,
    /// Seconds since the Unix epoch; 0 means never sent.
    pub wol_sent_at: f64,
    pub skip: bool,
}

/// Everything the state file holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub meta: MetaState,
    pub clients: BTreeMap<String, ClientState>,
}
