//! Process-scoped service wiring
//!
//! [`RuntimeServices`] is the explicitly constructed dependency context:
//! the settings store, both registries, the context manager, and the
//! execution façades, created once at startup and passed by reference.
//! Nothing in the core is looked up through ambient global state.

use std::sync::Arc;

use tracing::debug;

use crate::context::ContextManager;
use crate::environment::EnvironmentManager;
use crate::error::RuntimeError;
use crate::facade::{CommandRunner, CommandStream, RunOptions};
use crate::registry::{rename_on_override, ClientRegistration, RegistryError, RuntimeManager};
use crate::settings::{Settings, SettingsStore};
use stevedore_client::{
    CommandRequest, ContainerClient, DockerClient, DockerComposeClient, OrchestratorClient,
    PodmanClient,
};
use stevedore_runner::OutputStream;

// ============================================================================
// RuntimeServices
// ============================================================================

/// The service struct wiring registries, context tracking, and execution.
pub struct RuntimeServices {
    settings: Arc<SettingsStore>,
    environment: Arc<EnvironmentManager>,
    containers: Arc<RuntimeManager<dyn ContainerClient>>,
    orchestrators: Arc<RuntimeManager<dyn OrchestratorClient>>,
    contexts: Arc<ContextManager>,
    container_runner: Arc<CommandRunner<dyn ContainerClient>>,
    orchestrator_runner: Arc<CommandRunner<dyn OrchestratorClient>>,
}

impl RuntimeServices {
    /// Wire up the full service graph against one settings store.
    ///
    /// The container registry defaults to the Docker client id and renames
    /// clients on override changes. The orchestrator registry defaults to
    /// the Compose client id; its reconfiguration additionally toggles the
    /// compose-v2 capability on clients that declare it: any resolved
    /// command name other than the standalone binary selects the `docker
    /// compose` subcommand form.
    #[must_use]
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let environment = EnvironmentManager::new(&settings);

        let containers: Arc<RuntimeManager<dyn ContainerClient>> = Arc::new(RuntimeManager::new(
            settings.clone(),
            DockerClient::ID,
            |s| s.container_client.clone(),
            rename_on_override(|s| s.container_command.clone()),
        ));

        let orchestrators: Arc<RuntimeManager<dyn OrchestratorClient>> =
            Arc::new(RuntimeManager::new(
                settings.clone(),
                DockerComposeClient::ID,
                |s| s.orchestrator_client.clone(),
                Box::new(|client: &Arc<dyn OrchestratorClient>, s: &Settings| {
                    let name = s
                        .compose_command
                        .clone()
                        .unwrap_or_else(|| client.default_command_name().to_string());
                    client.set_command_name(&name);
                    if let Some(capability) = client.compose_v2() {
                        let enabled = name != DockerComposeClient::ID;
                        debug!(id = client.id(), enabled, "toggling compose v2 capability");
                        capability.set_compose_v2(enabled);
                    }
                }),
            ));

        let container_runner = Arc::new(CommandRunner::new(
            containers.clone(),
            environment.clone(),
        ));
        let orchestrator_runner = Arc::new(CommandRunner::new(
            orchestrators.clone(),
            environment.clone(),
        ));
        let contexts = ContextManager::new(container_runner.clone());

        Self {
            settings,
            environment,
            containers,
            orchestrators,
            contexts,
            container_runner,
            orchestrator_runner,
        }
    }

    /// Register the built-in Docker, Podman, and Compose clients.
    pub fn register_builtin_clients(&self) -> Result<BuiltinRegistrations, RegistryError> {
        Ok(BuiltinRegistrations {
            docker: self.containers.register(Arc::new(DockerClient::new()))?,
            podman: self.containers.register(Arc::new(PodmanClient::new()))?,
            compose: self
                .orchestrators
                .register(Arc::new(DockerComposeClient::new()))?,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    #[must_use]
    pub fn environment(&self) -> &Arc<EnvironmentManager> {
        &self.environment
    }

    #[must_use]
    pub fn containers(&self) -> &Arc<RuntimeManager<dyn ContainerClient>> {
        &self.containers
    }

    #[must_use]
    pub fn orchestrators(&self) -> &Arc<RuntimeManager<dyn OrchestratorClient>> {
        &self.orchestrators
    }

    #[must_use]
    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    /// Buffered execution against the active container client.
    pub async fn run_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<T, RuntimeError>
    where
        T: Default,
        F: FnOnce(&(dyn ContainerClient + 'static)) -> CommandRequest<T>,
    {
        self.container_runner
            .run_with_defaults(make_command, options)
            .await
    }

    /// Streaming execution against the active container client.
    pub async fn stream_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<CommandStream<T>, RuntimeError>
    where
        F: FnOnce(&(dyn ContainerClient + 'static)) -> CommandRequest<T>,
    {
        self.container_runner
            .stream_with_defaults(make_command, options)
            .await
    }

    /// Streaming execution yielding tagged raw lines.
    pub async fn stream_raw_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<OutputStream, RuntimeError>
    where
        F: FnOnce(&(dyn ContainerClient + 'static)) -> CommandRequest<T>,
    {
        self.container_runner
            .stream_raw_with_defaults(make_command, options)
            .await
    }

    /// Buffered execution against the active orchestrator client.
    pub async fn run_orchestrator_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<T, RuntimeError>
    where
        T: Default,
        F: FnOnce(&(dyn OrchestratorClient + 'static)) -> CommandRequest<T>,
    {
        self.orchestrator_runner
            .run_with_defaults(make_command, options)
            .await
    }
}

impl std::fmt::Debug for RuntimeServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeServices")
            .field("containers", &self.containers)
            .field("orchestrators", &self.orchestrators)
            .finish_non_exhaustive()
    }
}

/// Disposal guards for the built-in registrations.
#[derive(Debug)]
pub struct BuiltinRegistrations {
    pub docker: ClientRegistration<dyn ContainerClient>,
    pub podman: ClientRegistration<dyn ContainerClient>,
    pub compose: ClientRegistration<dyn OrchestratorClient>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_client::ClientIdentity;

    #[tokio::test]
    async fn test_builtin_docker_is_default_container_client() {
        let services = RuntimeServices::new(SettingsStore::new(Settings::default()));
        let _guards = services.register_builtin_clients().unwrap();
        let client = services.containers().get_client().await.unwrap();
        assert_eq!(client.id(), DockerClient::ID);
    }

    #[tokio::test]
    async fn test_builtin_registration_is_not_repeatable() {
        let services = RuntimeServices::new(SettingsStore::new(Settings::default()));
        let _guards = services.register_builtin_clients().unwrap();
        let err = services.register_builtin_clients().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClient { .. }));
    }

    #[tokio::test]
    async fn test_compose_command_override_toggles_v2() {
        let services = RuntimeServices::new(SettingsStore::new(Settings::default()));
        let _guards = services.register_builtin_clients().unwrap();
        let client = services.orchestrators().get_client().await.unwrap();

        // Standalone binary by default: capability off
        assert_eq!(client.command_name(), "docker-compose");
        assert!(!client.compose_v2().unwrap().compose_v2_enabled());

        services
            .settings()
            .update(|s| s.compose_command = Some("docker".into()));
        assert_eq!(client.command_name(), "docker");
        assert!(client.compose_v2().unwrap().compose_v2_enabled());

        services.settings().update(|s| s.compose_command = None);
        assert!(!client.compose_v2().unwrap().compose_v2_enabled());
    }

    #[tokio::test]
    async fn test_preferred_container_client_setting() {
        let services = RuntimeServices::new(SettingsStore::new(Settings {
            container_client: Some(PodmanClient::ID.into()),
            ..Settings::default()
        }));
        let _guards = services.register_builtin_clients().unwrap();
        let client = services.containers().get_client().await.unwrap();
        assert_eq!(client.id(), PodmanClient::ID);
    }
}
