use anyhow::Context;
use stevedore_shell::CommandLine;

use super::parse_json_lines;
use crate::context::{ContextInspection, ContextRecord};
use crate::identity::{ClientIdentity, CommandName, ContainerClient};
use crate::request::CommandRequest;

// ============================================================================
// DockerClient
// ============================================================================

/// Command producer for the Docker CLI.
#[derive(Debug)]
pub struct DockerClient {
    command_name: CommandName,
}

impl DockerClient {
    pub const ID: &'static str = "docker";
    const DEFAULT_COMMAND: &'static str = "docker";

    #[must_use]
    pub fn new() -> Self {
        Self {
            command_name: CommandName::new(Self::DEFAULT_COMMAND),
        }
    }
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdentity for DockerClient {
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

impl ContainerClient for DockerClient {
    fn version(&self) -> CommandRequest<String> {
        CommandRequest::new(
            self.command_name(),
            CommandLine::new()
                .arg("version")
                .named("--format", Some("{{.Server.Version}}")),
            |stdout, _| Ok(stdout.trim().to_string()),
        )
    }

    fn list_contexts(&self) -> CommandRequest<Vec<ContextRecord>> {
        // `docker context ls --format json` emits one JSON object per line
        CommandRequest::new(
            self.command_name(),
            CommandLine::new()
                .arg("context")
                .arg("ls")
                .named("--format", Some("json")),
            |stdout, _| Ok(parse_json_lines(stdout).iter().map(record_from_json).collect()),
        )
    }

    fn use_context(&self, name: &str) -> CommandRequest<()> {
        CommandRequest::void(
            self.command_name(),
            CommandLine::new().arg("context").arg("use").quoted(name),
        )
    }

    fn remove_context(&self, name: &str) -> CommandRequest<()> {
        CommandRequest::void(
            self.command_name(),
            CommandLine::new()
                .arg("context")
                .arg("rm")
                .arg("--force")
                .quoted(name),
        )
    }

    fn inspect_contexts(&self, names: &[String]) -> CommandRequest<Vec<ContextInspection>> {
        let mut args = CommandLine::new().arg("context").arg("inspect");
        for name in names {
            args = args.quoted(name.clone());
        }
        CommandRequest::new(self.command_name(), args, |stdout, _| {
            // inspect emits a single JSON array
            let entries: Vec<serde_json::Value> =
                serde_json::from_str(stdout.trim()).context("context inspect output was not a JSON array")?;
            Ok(entries.iter().map(inspection_from_json).collect())
        })
    }

    fn follow_events(&self) -> CommandRequest<serde_json::Value> {
        CommandRequest::new(
            self.command_name(),
            CommandLine::new()
                .arg("events")
                .named("--format", Some("{{json .}}")),
            |line, _| serde_json::from_str(line.trim()).context("event line was not valid JSON"),
        )
    }
}

fn record_from_json(value: &serde_json::Value) -> ContextRecord {
    ContextRecord {
        name: value["Name"].as_str().unwrap_or_default().to_string(),
        current: value["Current"].as_bool().unwrap_or(false),
        description: value["Description"].as_str().map(str::to_string),
        endpoint: value["DockerEndpoint"].as_str().map(str::to_string),
        raw: value.clone(),
    }
}

fn inspection_from_json(value: &serde_json::Value) -> ContextInspection {
    ContextInspection {
        name: value["Name"].as_str().unwrap_or_default().to_string(),
        metadata: value.get("Metadata").cloned().unwrap_or_default(),
        endpoints: value.get("Endpoints").cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_identity() {
        let client = DockerClient::new();
        assert_eq!(client.id(), "docker");
        assert_eq!(client.default_command_name(), "docker");
        assert_eq!(client.command_name(), "docker");
    }

    #[test]
    fn test_docker_command_name_override() {
        let client = DockerClient::new();
        client.set_command_name("docker-shim");
        let request = client.version();
        assert_eq!(request.command, "docker-shim");
    }

    #[test]
    fn test_list_contexts_parses_json_lines() {
        let client = DockerClient::new();
        let request = client.list_contexts();
        assert_eq!(
            request.args.to_argv(),
            vec!["context", "ls", "--format", "json"]
        );

        let stdout = concat!(
            "{\"Current\":true,\"Description\":\"Current DOCKER_HOST\",",
            "\"DockerEndpoint\":\"unix:///var/run/docker.sock\",\"Name\":\"default\"}\n",
            "{\"Current\":false,\"Name\":\"remote\",\"DockerEndpoint\":\"ssh://host\"}\n",
        );
        let parse = request.parse.unwrap();
        let contexts = parse(stdout, false).unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].name, "default");
        assert!(contexts[0].current);
        assert_eq!(
            contexts[0].endpoint.as_deref(),
            Some("unix:///var/run/docker.sock")
        );
        assert_eq!(contexts[1].name, "remote");
        assert!(!contexts[1].current);
    }

    #[test]
    fn test_use_context_is_void() {
        let client = DockerClient::new();
        let request = client.use_context("remote");
        assert!(request.parse.is_none());
        assert_eq!(request.args.to_argv(), vec!["context", "use", "remote"]);
    }

    #[test]
    fn test_inspect_contexts_parses_array() {
        let client = DockerClient::new();
        let request = client.inspect_contexts(&["default".to_string()]);
        let parse = request.parse.unwrap();

        let stdout = r#"[{"Name":"default","Metadata":{"Description":"x"},"Endpoints":{"docker":{}}}]"#;
        let inspections = parse(stdout, false).unwrap();
        assert_eq!(inspections.len(), 1);
        assert_eq!(inspections[0].name, "default");
        assert_eq!(inspections[0].metadata["Description"], "x");
    }

    #[test]
    fn test_inspect_contexts_rejects_non_array() {
        let client = DockerClient::new();
        let parse = client.inspect_contexts(&[]).parse.unwrap();
        assert!(parse("not json", false).is_err());
    }

    #[test]
    fn test_version_parse_trims() {
        let client = DockerClient::new();
        let parse = client.version().parse.unwrap();
        assert_eq!(parse("  24.0.7\n", false).unwrap(), "24.0.7");
    }
}
