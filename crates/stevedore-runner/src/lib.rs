//! Process execution engine for stevedore
//!
//! Runs external runtime CLIs either to completion (buffered stdout/stderr
//! plus exit code) or as a live stream of decoded output lines. Execution
//! is cooperative-cancellation aware: every call takes a
//! [`CancellationToken`], and cancelling one, explicitly or through its
//! deadline, terminates the child process rather than orphaning it.
//!
//! # Security Model
//!
//! All execution goes through [`CommandSpec`] to ensure argv-style
//! invocation: arguments cross the process boundary as discrete elements,
//! never as shell strings, so shell metacharacters in user data are inert.

pub mod cancel;
pub mod error;
pub mod executor;
pub mod spec;
pub mod wsl;

pub use cancel::CancellationToken;
pub use error::ExecError;
pub use executor::{OutputLine, OutputStream, ProcessExecutor, ProcessOutput, StdStream};
pub use spec::CommandSpec;
pub use wsl::{AdjustOptions, WslEnvironment};
