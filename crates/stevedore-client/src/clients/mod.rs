//! Built-in backend clients.
//!
//! These are ordinary implementations of the client contract; the registry
//! treats them no differently from externally supplied clients.

mod compose;
mod docker;
mod podman;

pub use compose::DockerComposeClient;
pub use docker::DockerClient;
pub use podman::PodmanClient;

/// Decode stdout as JSON lines, skipping lines that fail to parse.
///
/// Backends interleave warnings and progress noise with their JSON output;
/// anything that does not decode is ignored rather than treated as an
/// error.
pub(crate) fn parse_json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
