use anyhow::Context;
use stevedore_shell::CommandLine;

use crate::context::{ContextInspection, ContextRecord};
use crate::identity::{ClientIdentity, CommandName, ContainerClient};
use crate::request::CommandRequest;

// ============================================================================
// PodmanClient
// ============================================================================

/// Command producer for the Podman CLI.
///
/// Podman models remote targets as "system connections" rather than Docker
/// contexts; this client maps them onto the same [`ContextRecord`] shape so
/// the context manager treats both backends uniformly.
#[derive(Debug)]
pub struct PodmanClient {
    command_name: CommandName,
}

impl PodmanClient {
    pub const ID: &'static str = "podman";
    const DEFAULT_COMMAND: &'static str = "podman";

    #[must_use]
    pub fn new() -> Self {
        Self {
            command_name: CommandName::new(Self::DEFAULT_COMMAND),
        }
    }

    fn connection_args(&self) -> CommandLine {
        CommandLine::new()
            .arg("system")
            .arg("connection")
            .arg("list")
            .named("--format", Some("json"))
    }
}

impl Default for PodmanClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdentity for PodmanClient {
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

impl ContainerClient for PodmanClient {
    fn version(&self) -> CommandRequest<String> {
        CommandRequest::new(
            self.command_name(),
            CommandLine::new()
                .arg("version")
                .named("--format", Some("{{.Client.Version}}")),
            |stdout, _| Ok(stdout.trim().to_string()),
        )
    }

    fn list_contexts(&self) -> CommandRequest<Vec<ContextRecord>> {
        // `podman system connection list --format json` emits one array
        CommandRequest::new(self.command_name(), self.connection_args(), |stdout, _| {
            let entries: Vec<serde_json::Value> = serde_json::from_str(stdout.trim())
                .context("connection list output was not a JSON array")?;
            Ok(entries.iter().map(record_from_connection).collect())
        })
    }

    fn use_context(&self, name: &str) -> CommandRequest<()> {
        CommandRequest::void(
            self.command_name(),
            CommandLine::new()
                .arg("system")
                .arg("connection")
                .arg("default")
                .quoted(name),
        )
    }

    fn remove_context(&self, name: &str) -> CommandRequest<()> {
        CommandRequest::void(
            self.command_name(),
            CommandLine::new()
                .arg("system")
                .arg("connection")
                .arg("remove")
                .quoted(name),
        )
    }

    fn inspect_contexts(&self, names: &[String]) -> CommandRequest<Vec<ContextInspection>> {
        // Podman has no per-connection inspect; filter the listing instead.
        let wanted: Vec<String> = names.to_vec();
        CommandRequest::new(self.command_name(), self.connection_args(), move |stdout, _| {
            let entries: Vec<serde_json::Value> = serde_json::from_str(stdout.trim())
                .context("connection list output was not a JSON array")?;
            Ok(entries
                .iter()
                .filter(|entry| {
                    entry["Name"]
                        .as_str()
                        .is_some_and(|name| wanted.iter().any(|w| w == name))
                })
                .map(|entry| ContextInspection {
                    name: entry["Name"].as_str().unwrap_or_default().to_string(),
                    metadata: entry.clone(),
                    endpoints: entry.get("URI").cloned().unwrap_or_default(),
                })
                .collect())
        })
    }

    fn follow_events(&self) -> CommandRequest<serde_json::Value> {
        CommandRequest::new(
            self.command_name(),
            CommandLine::new().arg("events").named("--format", Some("json")),
            |line, _| serde_json::from_str(line.trim()).context("event line was not valid JSON"),
        )
    }
}

fn record_from_connection(value: &serde_json::Value) -> ContextRecord {
    ContextRecord {
        name: value["Name"].as_str().unwrap_or_default().to_string(),
        current: value["Default"].as_bool().unwrap_or(false),
        description: None,
        endpoint: value["URI"].as_str().map(str::to_string),
        raw: value.clone(),
    }
}
