//! Backend client contract for stevedore
//!
//! A *client* is a registered implementation capable of producing runtime
//! commands for one backend (Docker, Podman, a Compose-style orchestrator).
//! Clients never execute anything themselves: every operation returns a
//! [`CommandRequest`] describing one external invocation (command name,
//! argument tokens, and an optional output parser). The execution engine
//! consumes only that triple and never inspects command semantics.

pub mod clients;
pub mod context;
pub mod identity;
pub mod request;

pub use clients::{DockerClient, DockerComposeClient, PodmanClient};
pub use context::{ContextInspection, ContextRecord};
pub use identity::{ClientIdentity, CommandName, ComposeV2Capable, ContainerClient, OrchestratorClient};
pub use request::{CommandRequest, Parse};
