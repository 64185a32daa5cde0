use stevedore_client::CommandRequest;
use stevedore_shell::{CommandLine, Quoting, ShellToken};
use tracing::debug;

// ============================================================================
// WslEnvironment - Alternate Execution Environment Rewriting
// ============================================================================

/// Launcher executable for Windows Subsystem for Linux.
const WSL_LAUNCHER: &str = "wsl.exe";

/// Options for one environment adjustment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustOptions {
    /// Force-quote the wrapped command and every argument token. Needed
    /// when the launcher hands the inner command line to a shell for
    /// re-tokenization.
    pub should_quote: bool,
}

/// Decides whether a command must be rerouted through WSL and rewrites it
/// accordingly.
///
/// Rerouting applies only on a Windows host with the feature enabled;
/// everywhere else [`WslEnvironment::adjust`] is the identity. Callers
/// must adjust each logical command exactly once; there is no guard
/// against double-wrapping.
#[derive(Debug, Clone, Default)]
pub struct WslEnvironment {
    enabled: bool,
    distro: Option<String>,
}

impl WslEnvironment {
    #[must_use]
    pub fn new(enabled: bool, distro: Option<String>) -> Self {
        Self { enabled, distro }
    }

    /// An adapter that never rewrites.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether commands will actually be rerouted on this host.
    #[must_use]
    pub fn reroutes(&self) -> bool {
        self.enabled && cfg!(windows)
    }

    /// Rewrite `request` to run inside WSL, or return it unchanged when
    /// rerouting does not apply.
    ///
    /// The wrapped form is `wsl.exe [-d <distro>] -- <command> <args...>`,
    /// with the parser carried over untouched.
    #[must_use]
    pub fn adjust<T>(&self, request: CommandRequest<T>, options: &AdjustOptions) -> CommandRequest<T> {
        if !self.reroutes() {
            return request;
        }
        self.wrap(request, options)
    }

    fn wrap<T>(&self, request: CommandRequest<T>, options: &AdjustOptions) -> CommandRequest<T> {
        debug!(
            command = %request.command,
            distro = self.distro.as_deref().unwrap_or("<default>"),
            "rerouting command through wsl"
        );

        let inner: Vec<ShellToken> = request
            .args
            .tokens()
            .iter()
            .map(|token| {
                if options.should_quote {
                    ShellToken::quoted(token.value.clone())
                } else {
                    token.clone()
                }
            })
            .collect();

        let quoting = if options.should_quote {
            Quoting::Always
        } else {
            Quoting::Auto
        };
        let mut args = CommandLine::new()
            .named_with("-d", self.distro.clone(), quoting)
            .arg("--");
        args = if options.should_quote {
            args.quoted(request.command.clone())
        } else {
            args.arg(request.command.clone())
        };
        args = args.extend_tokens(inner);

        request.rewrap(WSL_LAUNCHER, args)
    }
}
