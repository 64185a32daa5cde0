use std::sync::RwLock;

use crate::context::{ContextInspection, ContextRecord};
use crate::request::CommandRequest;

// ============================================================================
// Client Identity & Capability Contracts
// ============================================================================

/// Identity shared by every registered backend client.
///
/// The id and default command name are fixed for the client's lifetime; the
/// effective command name is mutable because host configuration may
/// override it (e.g. pointing the Docker client at a `docker` shim). The
/// registry rewrites it on reconfiguration, so implementations keep it
/// behind interior mutability; see [`CommandName`].
pub trait ClientIdentity: Send + Sync + std::fmt::Debug {
    /// Unique registry id, e.g. `"docker"`.
    fn id(&self) -> &str;

    /// The command name used when no override is configured.
    fn default_command_name(&self) -> &str;

    /// The currently effective command name.
    fn command_name(&self) -> String;

    /// Replace the effective command name.
    fn set_command_name(&self, name: &str);
}

/// Interior-mutable command name cell for client implementations.
///
/// Individual reads and writes replace the whole value, so concurrent
/// readers never observe a torn state.
#[derive(Debug)]
pub struct CommandName {
    name: RwLock<String>,
}

impl CommandName {
    #[must_use]
    pub fn new(default: &str) -> Self {
        Self {
            name: RwLock::new(default.to_string()),
        }
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.name.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    pub fn set(&self, name: &str) {
        *self.name.write().unwrap_or_else(std::sync::PoisonError::into_inner) = name.to_string();
    }
}

/// A container runtime backend (Docker, Podman).
///
/// Each method is a pure command producer: it captures the client's current
/// command name and arguments into a [`CommandRequest`] without touching
/// the process boundary.
pub trait ContainerClient: ClientIdentity {
    /// Report the backend version (parsed as trimmed text).
    fn version(&self) -> CommandRequest<String>;

    /// List all contexts the backend knows about.
    fn list_contexts(&self) -> CommandRequest<Vec<ContextRecord>>;

    /// Switch the backend's current context. Void command.
    fn use_context(&self, name: &str) -> CommandRequest<()>;

    /// Remove a context by name. Void command.
    fn remove_context(&self, name: &str) -> CommandRequest<()>;

    /// Inspect contexts by name; yields detailed records.
    fn inspect_contexts(&self, names: &[String]) -> CommandRequest<Vec<ContextInspection>>;

    /// Follow the backend's event feed as a line stream of JSON values.
    fn follow_events(&self) -> CommandRequest<serde_json::Value>;
}

/// A container orchestrator backend (Compose-style).
pub trait OrchestratorClient: ClientIdentity {
    /// Report the orchestrator version (parsed as trimmed text).
    fn version(&self) -> CommandRequest<String>;

    /// Typed capability query: clients that can switch between the legacy
    /// standalone binary and the `compose` subcommand form declare it here.
    /// The default is no capability.
    fn compose_v2(&self) -> Option<&dyn ComposeV2Capable> {
        None
    }
}

/// Capability for orchestrator clients that support the `compose`
/// subcommand form (`docker compose`) alongside the standalone binary
/// (`docker-compose`).
pub trait ComposeV2Capable: Send + Sync {
    fn set_compose_v2(&self, enabled: bool);
    fn compose_v2_enabled(&self) -> bool;
}
