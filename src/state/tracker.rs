//! Per-client flags and UPS meta-state, persisted after every mutation.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::types::ClientConfig;
use crate::state::{ClientState, MetaState, PersistedState, StateStore};

pub struct ClientStateTracker {
    store: Box<dyn StateStore>,
    clock: Arc<dyn Clock>,
    meta: MetaState,
    clients: BTreeMap<String, ClientState>,
}

impl ClientStateTracker {
    /// Build from the configured clients merged with whatever the store holds.
    /// Persisted entries for unknown clients are dropped.
    pub fn new(clients: &[ClientConfig], store: Box<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let mut tracker = Self {
            store,
            clock,
            meta: MetaState::default(),
            clients: clients
                .iter()
                .map(|c| (c.name.clone(), ClientState::default()))
                .collect(),
        };
        tracker.load();
        tracker
    }

    fn load(&mut self) {
        let saved = match self.store.load() {
            Ok(Some(saved)) => saved,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to load state from file: {}", e);
                return;
            }
        };

        self.meta = saved.meta;
        for (name, state) in saved.clients {
            match self.clients.get_mut(&name) {
                Some(slot) => *slot = state,
                None => debug!("Ignoring persisted state for unknown client '{}'", name),
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.snapshot()) {
            warn!("Failed to save state to file: {}", e);
        }
    }

    fn with_client(&mut self, name: &str, f: impl FnOnce(&mut ClientState)) {
        if let Some(state) = self.clients.get_mut(name) {
            f(state);
        }
        self.persist();
    }

    fn client(&self, name: &str) -> Option<&ClientState> {
        self.clients.get(name)
    }

    /// Full copy of the current state document.
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            meta: self.meta.clone(),
            clients: self.clients.clone(),
        }
    }

    pub fn update(&mut self, name: &str, online: bool) {
        self.with_client(name, |s| s.is_online = online);
    }

    pub fn mark_wol_sent(&mut self, name: &str) {
        let now = self.clock.now();
        self.with_client(name, |s| {
            s.wol_sent = true;
            s.wol_sent_at = now;
        });
    }

    pub fn mark_skip(&mut self, name: &str) {
        self.with_client(name, |s| s.skip = true);
    }

    /// Snapshot reachability at the moment power loss is detected.
    pub fn mark_all_online_clients(&mut self) {
        for state in self.clients.values_mut() {
            state.was_online_before_battery = state.is_online;
        }
        self.persist();
    }

    pub fn set_ups_on_battery(&mut self, on_battery: bool, battery_percent: u8) {
        self.meta.ups_on_battery = on_battery;
        self.meta.battery_percent_at_shutdown = battery_percent;
        self.persist();
    }

    /// End of a restoration cycle. `is_online` is left alone.
    pub fn reset(&mut self) {
        for state in self.clients.values_mut() {
            state.was_online_before_battery = false;
            state.wol_sent = false;
            state.skip = false;
        }
        self.persist();
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.client(name).map_or(false, |s| s.is_online)
    }

    pub fn was_online_before_shutdown(&self, name: &str) -> bool {
        self.client(name).map_or(false, |s| s.was_online_before_battery)
    }

    pub fn has_been_wol_sent(&self, name: &str) -> bool {
        self.client(name).map_or(false, |s| s.wol_sent)
    }

    pub fn should_skip(&self, name: &str) -> bool {
        self.client(name).map_or(false, |s| s.skip)
    }

    /// Retry gate: at least `reattempt_delay` seconds since the last send.
    pub fn should_attempt_wol(&self, name: &str, reattempt_delay: u64) -> bool {
        let last = self.client(name).map_or(0.0, |s| s.wol_sent_at);
        self.clock.now() - last >= reattempt_delay as f64
    }

    pub fn was_ups_on_battery(&self) -> bool {
        self.meta.ups_on_battery
    }

    pub fn battery_percent_at_shutdown(&self) -> u8 {
        self.meta.battery_percent_at_shutdown
    }
}
