use stevedore_shell::CommandLine;

// ============================================================================
// CommandRequest - Declarative Command Description
// ============================================================================

/// Output parser for a command.
///
/// Receives the captured stdout (buffered mode) or one decoded chunk
/// (streaming mode) plus a flag indicating whether the invocation produced
/// any stderr output. Parse failures propagate to the caller unchanged.
pub type Parse<T> = Box<dyn Fn(&str, bool) -> anyhow::Result<T> + Send + Sync>;

/// A declarative description of one external invocation: command name,
/// argument tokens, and an optional output parser.
///
/// Requests are produced fresh per invocation and consumed by the
/// execution engine within a single call; they are never persisted. The
/// void variant ([`CommandRequest::void`]) omits the parser and signals
/// success by the absence of an error.
pub struct CommandRequest<T> {
    pub command: String,
    pub args: CommandLine,
    pub parse: Option<Parse<T>>,
}

impl<T> CommandRequest<T> {
    /// A request whose output is decoded by `parse`.
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        args: CommandLine,
        parse: impl Fn(&str, bool) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            parse: Some(Box::new(parse)),
        }
    }

    /// Replace the command name and arguments while keeping the parser.
    /// Used by execution-environment rewriting (e.g. WSL wrapping).
    #[must_use]
    pub fn rewrap(self, command: impl Into<String>, args: CommandLine) -> Self {
        Self {
            command: command.into(),
            args,
            parse: self.parse,
        }
    }
}

impl CommandRequest<()> {
    /// A void request: no parser, success is the absence of an error.
    #[must_use]
    pub fn void(command: impl Into<String>, args: CommandLine) -> Self {
        Self {
            command: command.into(),
            args,
            parse: None,
        }
    }
}

impl<T> std::fmt::Debug for CommandRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRequest")
            .field("command", &self.command)
            .field("args", &self.args.to_argv())
            .field("parse", &self.parse.is_some())
            .finish()
    }
}
