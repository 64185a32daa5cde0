//! Host configuration surface
//!
//! The core reads a small key-value settings surface owned by the host:
//! preferred client ids, command-name overrides, and the WSL rerouting
//! toggle. Settings are held by a [`SettingsStore`] that notifies
//! registered observers on every effective change, which is how registry
//! reconfiguration and execution-environment reloads are driven.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Settings
// ============================================================================

/// The configuration values the core consumes. All fields are optional or
/// defaulted, so an empty TOML document is a valid settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Preferred container client id. Unset means the registry default.
    pub container_client: Option<String>,
    /// Preferred orchestrator client id. Unset means the registry default.
    pub orchestrator_client: Option<String>,
    /// Command-name override for container clients.
    pub container_command: Option<String>,
    /// Command-name override for the orchestrator client.
    pub compose_command: Option<String>,
    /// Reroute commands through WSL on Windows hosts.
    pub execute_in_wsl: bool,
    /// Target WSL distribution; unset uses the default distribution.
    pub wsl_distro: Option<String>,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

// ============================================================================
// SettingsStore - Observable Settings Cell
// ============================================================================

type Observer = Box<dyn Fn(&Settings, &Settings) + Send + Sync>;

/// Shared, observable settings cell.
///
/// Reads clone the whole value, writes replace it, so readers never see a
/// torn state. Observers receive `(old, new)` and only fire on effective
/// changes.
pub struct SettingsStore {
    current: RwLock<Settings>,
    observers: Mutex<Vec<(u64, Observer)>>,
    next_observer_id: AtomicU64,
}

impl SettingsStore {
    #[must_use]
    pub fn new(settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(settings),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
        })
    }

    /// A snapshot of the current settings.
    #[must_use]
    pub fn current(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply a mutation and notify observers when the value actually
    /// changed.
    pub fn update(&self, apply: impl FnOnce(&mut Settings)) {
        let (old, new) = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let old = guard.clone();
            apply(&mut guard);
            (old, guard.clone())
        };

        if old == new {
            return;
        }
        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, observer) in observers.iter() {
            observer(&old, &new);
        }
    }

    /// Register a change observer. The observer lives until the returned
    /// subscription is dropped.
    #[must_use]
    pub fn subscribe(
        self: &Arc<Self>,
        observer: impl Fn(&Settings, &Settings) + Send + Sync + 'static,
    ) -> SettingsSubscription {
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(observer)));
        SettingsSubscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(observer_id, _)| *observer_id != id);
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

/// Scoped observer registration; dropping it unregisters the observer.
#[derive(Debug)]
pub struct SettingsSubscription {
    store: Weak<SettingsStore>,
    id: u64,
}

impl Drop for SettingsSubscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_empty_toml_is_valid() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "container_client = \"podman\"\nexecute_in_wsl = true\nwsl_distro = \"Ubuntu\"\n",
        )
        .unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(settings.container_client.as_deref(), Some("podman"));
        assert!(settings.execute_in_wsl);
        assert_eq!(settings.wsl_distro.as_deref(), Some("Ubuntu"));
    }

    #[test]
    fn test_load_missing_file_fails_with_read_error() {
        let err = Settings::load_from_path(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file_fails_with_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "container_client = [not toml").unwrap();
        let err = Settings::load_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_update_notifies_on_change_only() {
        let store = SettingsStore::new(Settings::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        let _sub = store.subscribe(move |old, new| {
            assert_ne!(old, new);
            observed.fetch_add(1, Ordering::SeqCst);
        });

        store.update(|s| s.container_command = Some("nerdctl".into()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Identical value: no notification
        store.update(|s| s.container_command = Some("nerdctl".into()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let store = SettingsStore::new(Settings::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        let sub = store.subscribe(move |_, _| {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        store.update(|s| s.execute_in_wsl = true);
        drop(sub);
        store.update(|s| s.execute_in_wsl = false);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
