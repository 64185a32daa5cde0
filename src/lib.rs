//! stevedore - pluggable container runtime clients
//!
//! Lets a development tool drive one or more container runtime backends
//! (Docker, Podman, a Compose-style orchestrator) through a uniform
//! command abstraction:
//!
//! - **Registry** ([`RuntimeManager`]): dynamic client registration with a
//!   preferred-client setting, a default fallback, and a bounded wait for
//!   clients that register asynchronously.
//! - **Context tracking** ([`ContextManager`]): observes the active
//!   client's current context and fires a change event exactly once per
//!   transition.
//! - **Execution façade** ([`CommandRunner`], [`RuntimeServices`]):
//!   resolve client → build command → adjust for the execution
//!   environment (WSL) → execute buffered or streaming, with cooperative
//!   cancellation throughout.
//!
//! The backend-facing pieces live in the member crates:
//! `stevedore-client` (client contract and built-in clients),
//! `stevedore-runner` (process execution, cancellation, WSL rewriting),
//! and `stevedore-shell` (shell-safe argument composition).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stevedore::{RunOptions, RuntimeServices, Settings, SettingsStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let services = RuntimeServices::new(SettingsStore::new(Settings::default()));
//! let _guards = services.register_builtin_clients()?;
//!
//! let version = services
//!     .run_with_defaults(|client| client.version(), &RunOptions::new())
//!     .await?;
//! println!("runtime version: {version}");
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod environment;
pub mod error;
pub mod facade;
pub mod logging;
pub mod registry;
pub mod services;
pub mod settings;

pub use context::{ContextManager, ContextSubscription, current_of};
pub use environment::EnvironmentManager;
pub use error::RuntimeError;
pub use facade::{CommandRunner, CommandStream, RunOptions};
pub use registry::{
    CLIENT_REGISTRATION_TIMEOUT, ClientRegistration, RegistryError, RuntimeManager,
    rename_on_override,
};
pub use services::{BuiltinRegistrations, RuntimeServices};
pub use settings::{Settings, SettingsError, SettingsStore, SettingsSubscription};

// Member-crate surface, re-exported for embedders
pub use stevedore_client as client;
pub use stevedore_runner as runner;
pub use stevedore_shell as shell;
