//! Error types for process execution

use thiserror::Error;

/// Execution errors for external runtime commands.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o failure during execution: {0}")]
    Io(#[from] std::io::Error),

    /// The process ran but exited nonzero. Carries both captured streams
    /// so callers can classify specific exit codes as expected negative
    /// results instead of failures.
    #[error("'{program}' exited with code {code}")]
    ExitCode {
        program: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The call was cancelled, either explicitly or by a deadline. Always
    /// distinguishable from success and from [`ExecError::ExitCode`].
    #[error("execution was cancelled")]
    Cancelled,
}
