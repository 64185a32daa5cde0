#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use stevedore::client::{
    ClientIdentity, CommandName, CommandRequest, ContainerClient, ContextInspection,
    ContextRecord,
};
use stevedore::shell::CommandLine;
use stevedore::{RuntimeServices, Settings, SettingsStore};

/// A container client whose commands run against `sh`, emitting canned
/// context state held inside the stub. State mutations (switch/remove)
/// update the stub's own backend state so subsequent listings observe
/// them, the way a real backend would.
#[derive(Debug)]
pub struct StubClient {
    id: &'static str,
    name: CommandName,
    contexts: Mutex<Vec<ContextRecord>>,
}

impl StubClient {
    pub fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: CommandName::new("sh"),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_contexts(&self, records: Vec<ContextRecord>) {
        *self.contexts.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    fn snapshot(&self) -> Vec<ContextRecord> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub fn record(name: &str, current: bool) -> ContextRecord {
    ContextRecord {
        name: name.to_string(),
        current,
        ..ContextRecord::default()
    }
}

/// A script that prints `payload` verbatim on stdout.
fn emit_script(payload: &str) -> CommandLine {
    CommandLine::new()
        .arg("-c")
        .arg(format!("cat <<'STEVEDORE_EOF'\n{payload}\nSTEVEDORE_EOF"))
}

impl ClientIdentity for StubClient {
    fn id(&self) -> &str {
        self.id
    }

    fn default_command_name(&self) -> &str {
        "sh"
    }

    fn command_name(&self) -> String {
        self.name.get()
    }

    fn set_command_name(&self, name: &str) {
        self.name.set(name);
    }
}

impl ContainerClient for StubClient {
    fn version(&self) -> CommandRequest<String> {
        CommandRequest::new(
            self.command_name(),
            CommandLine::new().arg("-c").arg("echo 24.0.7-stub"),
            |out, _| Ok(out.trim().to_string()),
        )
    }

    fn list_contexts(&self) -> CommandRequest<Vec<ContextRecord>> {
        let payload = self
            .snapshot()
            .iter()
            .map(|record| serde_json::to_string(record).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        CommandRequest::new(self.command_name(), emit_script(&payload), |out, _| {
            Ok(out
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect())
        })
    }

    fn use_context(&self, name: &str) -> CommandRequest<()> {
        {
            let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
            for context in contexts.iter_mut() {
                context.current = context.name == name;
            }
        }
        CommandRequest::void(self.command_name(), CommandLine::new().arg("-c").arg("true"))
    }

    fn remove_context(&self, name: &str) -> CommandRequest<()> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|context| context.name != name);
        CommandRequest::void(self.command_name(), CommandLine::new().arg("-c").arg("true"))
    }

    fn inspect_contexts(&self, names: &[String]) -> CommandRequest<Vec<ContextInspection>> {
        let matches: Vec<ContextInspection> = self
            .snapshot()
            .iter()
            .filter(|record| names.contains(&record.name))
            .map(|record| ContextInspection {
                name: record.name.clone(),
                ..ContextInspection::default()
            })
            .collect();
        let payload = serde_json::to_string(&matches).unwrap();
        CommandRequest::new(self.command_name(), emit_script(&payload), |out, _| {
            Ok(serde_json::from_str(out.trim())?)
        })
    }

    fn follow_events(&self) -> CommandRequest<serde_json::Value> {
        CommandRequest::new(
            self.command_name(),
            emit_script("{\"status\":\"start\"}\n{\"status\":\"stop\"}"),
            |line, _| Ok(serde_json::from_str(line.trim())?),
        )
    }
}

pub fn services() -> RuntimeServices {
    services_with(Settings::default())
}

pub fn services_with(settings: Settings) -> RuntimeServices {
    RuntimeServices::new(SettingsStore::new(settings))
}
