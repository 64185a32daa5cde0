//! Execution-environment settings tracking
//!
//! Holds the current [`WslEnvironment`] adapter and rebuilds it whenever
//! the relevant settings change, so every façade call picks up the latest
//! rerouting configuration without re-reading the store.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::settings::{Settings, SettingsStore, SettingsSubscription};
use stevedore_runner::WslEnvironment;

/// Settings-backed source of the current execution-environment adapter.
pub struct EnvironmentManager {
    current: RwLock<WslEnvironment>,
    _settings_sub: SettingsSubscription,
}

impl EnvironmentManager {
    #[must_use]
    pub fn new(settings: &Arc<SettingsStore>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let settings_sub = settings.subscribe(move |_, new| {
                if let Some(manager) = weak.upgrade() {
                    manager.reload(new);
                }
            });
            Self {
                current: RwLock::new(from_settings(&settings.current())),
                _settings_sub: settings_sub,
            }
        })
    }

    /// The adapter built from the most recently observed settings.
    #[must_use]
    pub fn current(&self) -> WslEnvironment {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reload(&self, settings: &Settings) {
        debug!(
            execute_in_wsl = settings.execute_in_wsl,
            wsl_distro = settings.wsl_distro.as_deref().unwrap_or("<default>"),
            "execution environment settings changed"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = from_settings(settings);
    }
}

impl std::fmt::Debug for EnvironmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentManager")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

fn from_settings(settings: &Settings) -> WslEnvironment {
    WslEnvironment::new(settings.execute_in_wsl, settings.wsl_distro.clone())
}
