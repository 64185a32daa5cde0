use std::sync::atomic::{AtomicBool, Ordering};

use stevedore_shell::CommandLine;

use crate::identity::{ClientIdentity, CommandName, ComposeV2Capable, OrchestratorClient};
use crate::request::CommandRequest;

// ============================================================================
// DockerComposeClient
// ============================================================================

/// Command producer for Docker Compose.
///
/// Supports both invocation forms: the legacy standalone `docker-compose`
/// binary and the `docker compose` subcommand. Which form is active is a
/// capability flag toggled by the orchestrator registry's reconfiguration
/// rather than a command rename; see [`ComposeV2Capable`].
#[derive(Debug)]
pub struct DockerComposeClient {
    command_name: CommandName,
    compose_v2: AtomicBool,
}

impl DockerComposeClient {
    pub const ID: &'static str = "docker-compose";
    const DEFAULT_COMMAND: &'static str = "docker-compose";

    #[must_use]
    pub fn new() -> Self {
        Self {
            command_name: CommandName::new(Self::DEFAULT_COMMAND),
            compose_v2: AtomicBool::new(false),
        }
    }

    /// Command name plus leading subcommand tokens for the active form.
    fn invocation(&self) -> (String, CommandLine) {
        if self.compose_v2_enabled() {
            ("docker".to_string(), CommandLine::new().arg("compose"))
        } else {
            (self.command_name(), CommandLine::new())
        }
    }
}

impl Default for DockerComposeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdentity for DockerComposeClient {
    fn id(&self) -> &str {
        Self::ID
    }

    fn default_command_name(&self) -> &str {
        Self::DEFAULT_COMMAND
    }

    fn command_name(&self) -> String {
        self.command_name.get()
    }

    fn set_command_name(&self, name: &str) {
        self.command_name.set(name);
    }
}

impl OrchestratorClient for DockerComposeClient {
    fn version(&self) -> CommandRequest<String> {
        let (command, args) = self.invocation();
        CommandRequest::new(
            command,
            args.arg("version").flag("--short", true),
            |stdout, _| Ok(stdout.trim().to_string()),
        )
    }

    fn compose_v2(&self) -> Option<&dyn ComposeV2Capable> {
        Some(self)
    }
}

impl ComposeV2Capable for DockerComposeClient {
    fn set_compose_v2(&self, enabled: bool) {
        self.compose_v2.store(enabled, Ordering::SeqCst);
    }

    fn compose_v2_enabled(&self) -> bool {
        self.compose_v2.load(Ordering::SeqCst)
    }
}
