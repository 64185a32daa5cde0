//! Command execution façade
//!
//! [`CommandRunner`] is the path every caller takes: resolve the active
//! client, let the caller build a [`CommandRequest`] from it, adjust the
//! request for the execution environment, then execute buffered or
//! streaming. Each call is an independent pipeline; the only shared state
//! is the registry map and the settings-backed environment adapter.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::environment::EnvironmentManager;
use crate::error::RuntimeError;
use crate::registry::RuntimeManager;
use stevedore_client::{ClientIdentity, CommandRequest, Parse};
use stevedore_runner::{
    AdjustOptions, CancellationToken, CommandSpec, OutputStream, ProcessExecutor,
};

// ============================================================================
// RunOptions
// ============================================================================

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cancellation for this call; absent means the call runs to
    /// completion. Deadlines are attached by the caller via
    /// [`CancellationToken::with_deadline`].
    pub token: Option<CancellationToken>,
    /// Working directory override for the spawned process.
    pub cwd: Option<PathBuf>,
    /// Environment entries layered over the inherited environment.
    pub env: HashMap<String, String>,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// CommandRunner
// ============================================================================

/// Execution façade bound to one registry (container clients or
/// orchestrator clients).
pub struct CommandRunner<C: ClientIdentity + ?Sized> {
    manager: Arc<RuntimeManager<C>>,
    environment: Arc<EnvironmentManager>,
    executor: ProcessExecutor,
}

impl<C: ClientIdentity + ?Sized + 'static> CommandRunner<C> {
    #[must_use]
    pub fn new(manager: Arc<RuntimeManager<C>>, environment: Arc<EnvironmentManager>) -> Self {
        Self {
            manager,
            environment,
            executor: ProcessExecutor::new(),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<RuntimeManager<C>> {
        &self.manager
    }

    /// Resolve the active client, build a command from it, and run it to
    /// completion.
    ///
    /// On exit 0 the request's `parse` function is invoked exactly once
    /// with `(stdout, had_stderr)`; a request without a parser yields the
    /// output type's default (`()` for void commands). All errors
    /// propagate unchanged.
    pub async fn run_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<T, RuntimeError>
    where
        T: Default,
        F: FnOnce(&C) -> CommandRequest<T>,
    {
        let (request, token) = self.prepare(make_command, options).await?;
        let spec = build_spec(&request, options);
        debug!(command = %request.command, "running buffered command");

        let output = self.executor.execute(&spec, &token).await?;
        match request.parse {
            Some(parse) => parse(&output.stdout, output.had_stderr()).map_err(RuntimeError::Parse),
            None => Ok(T::default()),
        }
    }

    /// Like [`CommandRunner::run_with_defaults`] but streaming: each
    /// output line is passed through the request's `parse` function as it
    /// arrives. The request must supply a parser; use
    /// [`CommandRunner::stream_raw_with_defaults`] for untyped lines.
    pub async fn stream_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<CommandStream<T>, RuntimeError>
    where
        F: FnOnce(&C) -> CommandRequest<T>,
    {
        let (request, token) = self.prepare(make_command, options).await?;
        let Some(parse) = request.parse else {
            return Err(RuntimeError::Parse(anyhow::anyhow!(
                "streamed command '{}' supplies no parse function",
                request.command
            )));
        };

        let spec = build_spec_raw(&request.command, request.args.to_argv(), options);
        debug!(command = %request.command, "running streamed command");
        let raw = self.executor.stream(&spec, &token)?;
        Ok(CommandStream { raw, parse })
    }

    /// Streaming execution without per-line parsing; yields tagged raw
    /// lines.
    pub async fn stream_raw_with_defaults<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<OutputStream, RuntimeError>
    where
        F: FnOnce(&C) -> CommandRequest<T>,
    {
        let (request, token) = self.prepare(make_command, options).await?;
        let spec = build_spec(&request, options);
        debug!(command = %request.command, "running streamed command");
        Ok(self.executor.stream(&spec, &token)?)
    }

    // Resolution always completes before command construction, and
    // construction before environment adjustment.
    async fn prepare<T, F>(
        &self,
        make_command: F,
        options: &RunOptions,
    ) -> Result<(CommandRequest<T>, CancellationToken), RuntimeError>
    where
        F: FnOnce(&C) -> CommandRequest<T>,
    {
        let client = self.manager.get_client().await?;
        let request = make_command(client.as_ref());
        let request = self
            .environment
            .current()
            .adjust(request, &AdjustOptions::default());
        let token = options.token.clone().unwrap_or_default();
        Ok((request, token))
    }
}

impl<C: ClientIdentity + ?Sized> std::fmt::Debug for CommandRunner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

fn build_spec<T>(request: &CommandRequest<T>, options: &RunOptions) -> CommandSpec {
    build_spec_raw(&request.command, request.args.to_argv(), options)
}

fn build_spec_raw(command: &str, argv: Vec<String>, options: &RunOptions) -> CommandSpec {
    let mut spec = CommandSpec::new(command).args(argv);
    if let Some(ref cwd) = options.cwd {
        spec = spec.cwd(cwd);
    }
    if !options.env.is_empty() {
        spec = spec.envs(options.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    spec
}

// ============================================================================
// CommandStream
// ============================================================================

/// Typed streamed output: raw lines passed through the command's `parse`
/// function as they arrive. Finite and non-restartable, like the
/// underlying [`OutputStream`].
pub struct CommandStream<T> {
    raw: OutputStream,
    parse: Parse<T>,
}

impl<T> CommandStream<T> {
    /// Next parsed item. Execution and parse errors arrive in-stream;
    /// `None` means the process exited and all output was delivered.
    pub async fn next(&mut self) -> Option<Result<T, RuntimeError>> {
        let item = self.raw.next().await?;
        Some(match item {
            Ok(line) => (self.parse)(&line.content, line.is_stderr()).map_err(RuntimeError::Parse),
            Err(err) => Err(RuntimeError::Execution(err)),
        })
    }

    /// Collect the remaining items, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<T>, RuntimeError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> std::fmt::Debug for CommandStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStream").finish_non_exhaustive()
    }
}
