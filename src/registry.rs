//! Client registry with dynamic selection
//!
//! A [`RuntimeManager`] maps client ids to registered backend
//! implementations. Registration is dynamic (plugins register at host
//! startup, possibly after first use), selection honors a preferred-id
//! setting with a bounded wait for late registrations, and a settings
//! observer re-applies command-name overrides to every registered client
//! on configuration changes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::settings::{Settings, SettingsStore, SettingsSubscription};
use stevedore_client::ClientIdentity;
use stevedore_runner::CancellationToken;

/// How long a resolution call waits for a preferred client that has not
/// registered yet.
pub const CLIENT_REGISTRATION_TIMEOUT: Duration = Duration::from_millis(1000);

const REGISTRATION_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registering an id already present. Fatal to that registration call
    /// only; the original registration stays active.
    #[error("a client with id '{id}' is already registered")]
    DuplicateClient { id: String },

    /// No matching client was available at resolution time, including
    /// after the bounded registration wait.
    #[error("no client registered{}", id.as_ref().map(|id| format!(" with id '{id}'")).unwrap_or_default())]
    NoClientRegistered { id: Option<String> },
}

// ============================================================================
// RuntimeManager
// ============================================================================

/// Selects the preferred client id from the current settings.
pub type PreferredFn = fn(&Settings) -> Option<String>;

/// Re-applies configuration to one registered client. Run on registration
/// and on every settings change.
pub type ReconfigureFn<C> = Box<dyn Fn(&Arc<C>, &Settings) + Send + Sync>;

/// The default reconfiguration strategy: rename the client to the
/// configured override, or back to its own default when the override is
/// unset.
pub fn rename_on_override<C>(override_of: fn(&Settings) -> Option<String>) -> ReconfigureFn<C>
where
    C: ClientIdentity + ?Sized,
{
    Box::new(move |client, settings| {
        let name =
            override_of(settings).unwrap_or_else(|| client.default_command_name().to_string());
        debug!(id = client.id(), command = %name, "applying client command name");
        client.set_command_name(&name);
    })
}

struct Shared<C: ?Sized> {
    clients: RwLock<HashMap<String, Arc<C>>>,
    default_client_id: String,
    settings: Arc<SettingsStore>,
    preferred: PreferredFn,
    reconfigure: ReconfigureFn<C>,
    registered: broadcast::Sender<String>,
}

impl<C: ClientIdentity + ?Sized> Shared<C> {
    fn lookup(&self, id: &str) -> Option<Arc<C>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &str) {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            debug!(id, "client unregistered");
        }
    }

    fn reconfigure_all(&self, settings: &Settings) {
        let clients: Vec<Arc<C>> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for client in &clients {
            (self.reconfigure)(client, settings);
        }
    }
}

/// Registry of backend clients keyed by id, generic over the client
/// contract (`dyn ContainerClient`, `dyn OrchestratorClient`).
///
/// Resolution reads the preferred-id setting: unset falls back to the
/// default client; a preferred id that has not registered yet is awaited
/// up to [`CLIENT_REGISTRATION_TIMEOUT`] on a broadcast registration
/// event, so concurrent waiters all observe the same registration.
///
/// Dropping the manager releases the settings observer and the event
/// channel; client handles already resolved by in-flight callers stay
/// alive.
pub struct RuntimeManager<C: ClientIdentity + ?Sized> {
    shared: Arc<Shared<C>>,
    _settings_sub: SettingsSubscription,
}

impl<C: ClientIdentity + ?Sized + 'static> RuntimeManager<C> {
    pub fn new(
        settings: Arc<SettingsStore>,
        default_client_id: impl Into<String>,
        preferred: PreferredFn,
        reconfigure: ReconfigureFn<C>,
    ) -> Self {
        let (registered, _) = broadcast::channel(REGISTRATION_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            clients: RwLock::new(HashMap::new()),
            default_client_id: default_client_id.into(),
            settings: settings.clone(),
            preferred,
            reconfigure,
            registered,
        });

        let weak = Arc::downgrade(&shared);
        let settings_sub = settings.subscribe(move |_, new| {
            if let Some(shared) = weak.upgrade() {
                shared.reconfigure_all(new);
            }
        });

        Self {
            shared,
            _settings_sub: settings_sub,
        }
    }

    /// Register a client under its own id.
    ///
    /// On success the current configuration override is applied to the new
    /// client, the registration event fires, and a disposal guard is
    /// returned; dropping (or explicitly disposing) the guard removes the
    /// client again.
    pub fn register(&self, client: Arc<C>) -> Result<ClientRegistration<C>, RegistryError> {
        let id = client.id().to_string();
        {
            let mut clients = self
                .shared
                .clients
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if clients.contains_key(&id) {
                return Err(RegistryError::DuplicateClient { id });
            }
            clients.insert(id.clone(), client.clone());
        }

        (self.shared.reconfigure)(&client, &self.shared.settings.current());
        info!(id = %id, "client registered");
        let _ = self.shared.registered.send(id.clone());

        Ok(ClientRegistration {
            shared: Arc::downgrade(&self.shared),
            id,
            disposed: false,
        })
    }

    /// Resolve the active client.
    ///
    /// No preferred id → the default client, or
    /// [`RegistryError::NoClientRegistered`] if it never registered. A
    /// preferred id that is registered resolves immediately; one that is
    /// not is awaited up to [`CLIENT_REGISTRATION_TIMEOUT`]. The wait
    /// subscribes to the registration event before re-checking the map, so
    /// a registration landing between check and wait is never lost.
    pub async fn get_client(&self) -> Result<Arc<C>, RegistryError> {
        let preferred = (self.shared.preferred)(&self.shared.settings.current());
        let Some(id) = preferred else {
            return self
                .shared
                .lookup(&self.shared.default_client_id)
                .ok_or(RegistryError::NoClientRegistered { id: None });
        };

        if let Some(client) = self.shared.lookup(&id) {
            return Ok(client);
        }

        let mut events = self.shared.registered.subscribe();
        if let Some(client) = self.shared.lookup(&id) {
            return Ok(client);
        }

        debug!(id = %id, "waiting for preferred client to register");
        let deadline = CancellationToken::new().with_deadline(CLIENT_REGISTRATION_TIMEOUT);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(registered_id) if registered_id == id => {
                        if let Some(client) = self.shared.lookup(&id) {
                            return Ok(client);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Missed events; fall back to the map
                        if let Some(client) = self.shared.lookup(&id) {
                            return Ok(client);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RegistryError::NoClientRegistered { id: Some(id) });
                    }
                },
                () = deadline.cancelled() => {
                    return Err(RegistryError::NoClientRegistered { id: Some(id) });
                }
            }
        }
    }

    /// The effective command name of the active client.
    pub async fn get_command_name(&self) -> Result<String, RegistryError> {
        Ok(self.get_client().await?.command_name())
    }
}

impl<C: ClientIdentity + ?Sized> std::fmt::Debug for RuntimeManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self
            .shared
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("RuntimeManager")
            .field("default_client_id", &self.shared.default_client_id)
            .field("registered", &ids)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientRegistration - Disposal Guard
// ============================================================================

/// Guard for one registration; dropping it (or calling
/// [`ClientRegistration::dispose`]) removes the client from the registry.
/// Removal is idempotent.
pub struct ClientRegistration<C: ClientIdentity + ?Sized> {
    shared: Weak<Shared<C>>,
    id: String,
    disposed: bool,
}

impl<C: ClientIdentity + ?Sized> ClientRegistration<C> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the client now instead of at drop time.
    pub fn dispose(mut self) {
        self.remove_once();
    }

    fn remove_once(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(&self.id);
        }
    }
}

impl<C: ClientIdentity + ?Sized> Drop for ClientRegistration<C> {
    fn drop(&mut self) {
        self.remove_once();
    }
}

impl<C: ClientIdentity + ?Sized> std::fmt::Debug for ClientRegistration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("id", &self.id)
            .field("disposed", &self.disposed)
            .finish()
    }
}
