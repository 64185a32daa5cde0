//! Top-level error type for runtime operations

use thiserror::Error;

use crate::registry::RegistryError;
use stevedore_runner::ExecError;

/// Any failure a façade call can surface.
///
/// The core never swallows errors: resolution, adjustment, execution, and
/// parse failures all propagate unchanged, and recovery decisions belong
/// to callers. Cancellation arrives as
/// [`ExecError::Cancelled`] through the `Execution` variant and is always
/// distinguishable from both success and a nonzero exit.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Execution(#[from] ExecError),

    /// A command's `parse` function rejected the output. Carried as-is,
    /// with no extra wrapping.
    #[error("failed to parse command output: {0}")]
    Parse(#[source] anyhow::Error),
}

impl RuntimeError {
    /// Whether this error is a cancellation (explicit or deadline).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Execution(ExecError::Cancelled))
    }

    /// The process exit code, when this error is a nonzero exit. Lets
    /// callers classify specific codes as expected negative results.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Execution(ExecError::ExitCode { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinct_from_exit_code() {
        let cancelled = RuntimeError::Execution(ExecError::Cancelled);
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.exit_code(), None);

        let failed = RuntimeError::Execution(ExecError::ExitCode {
            program: "docker".into(),
            code: 125,
            stdout: String::new(),
            stderr: String::new(),
        });
        assert!(!failed.is_cancelled());
        assert_eq!(failed.exit_code(), Some(125));
    }
}
