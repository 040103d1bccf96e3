//! State persistence backends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

use crate::state::PersistedState;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable load/save of the whole state document. No policy lives here.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<PersistedState>, StateError>;

    fn save(&self, state: &PersistedState) -> Result<(), StateError>;
}

/// JSON file store. Saves go to a sibling temp file that is renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: io::Error) -> StateError {
        StateError::Io { path: self.path.clone(), source }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        let state = serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.temp_path();

        fs::write(&tmp, content).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.io_err(e)
        })?;

        trace!("State saved to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store for tests. Clones share the same backing slot.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    slot: std::sync::Arc<std::sync::Mutex<Option<PersistedState>>>,
    fail_saves: std::sync::Arc<std::sync::atomic::AtomicBool>,
    saves: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn with_state(state: PersistedState) -> Self {
        let store = Self::default();
        *store.slot.lock().unwrap() = Some(state);
        store
    }

    pub fn stored(&self) -> Option<PersistedState> {
        self.slot.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>, StateError> {
        Ok(self.stored())
    }

    fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StateError::Io {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::Other, "simulated save failure"),
            });
        }
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.slot.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClientState, MetaState};

    fn sample() -> PersistedState {
        let mut state = PersistedState {
            meta: MetaState {
                ups_on_battery: true,
                battery_percent_at_shutdown: 64,
            },
            ..Default::default()
        };
        state.clients.insert(
            "nas".into(),
            ClientState {
                was_online_before_battery: true,
                is_online: false,
                wol_sent: true,
                wol_sent_at: 1_700_000_123.5,
                skip: false,
            },
        );
        state.clients.insert(
            "printer".into(),
            ClientState {
                skip: true,
                ..Default::default()
            },
        );
        state
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn absent_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonFileStore::new(path).load(), Err(StateError::Corrupt { .. })));
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"meta":{"ups_on_battery":true},"clients":{"nas":{"is_online":true}}}"#).unwrap();

        let state = JsonFileStore::new(path).load().unwrap().unwrap();
        assert!(state.meta.ups_on_battery);
        assert_eq!(state.meta.battery_percent_at_shutdown, 100);
        assert!(state.clients["nas"].is_online);
        assert_eq!(state.clients["nas"].wol_sent_at, 0.0);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope").join("state.json"));
        assert!(matches!(store.save(&sample()), Err(StateError::Io { .. })));
    }
}
