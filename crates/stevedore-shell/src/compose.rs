use crate::quoting::{Platform, needs_quoting, quote};

// ============================================================================
// CommandLine - Declarative Argument Composition
// ============================================================================

/// Quoting preference carried by each token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// Quote only when the value contains whitespace or shell
    /// metacharacters.
    #[default]
    Auto,
    /// Always quote when rendering, regardless of content.
    Always,
}

/// One argument token: a literal value plus its quoting preference.
///
/// The value is always the *unquoted* literal; quoting is applied only by
/// [`CommandLine::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellToken {
    pub value: String,
    pub quoting: Quoting,
}

impl ShellToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoting: Quoting::Auto,
        }
    }

    #[must_use]
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoting: Quoting::Always,
        }
    }
}

/// An ordered argument list composed from declarative fragments.
///
/// Mirrors the builder style of a process spec: each method appends tokens
/// and returns `self`, so command lines read as a single chained
/// expression.
///
/// # Example
///
/// ```rust
/// use stevedore_shell::CommandLine;
///
/// let args = CommandLine::new()
///     .arg("context")
///     .arg("ls")
///     .named("--format", Some("json"));
///
/// assert_eq!(args.to_argv(), vec!["context", "ls", "--format", "json"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    tokens: Vec<ShellToken>,
}

impl CommandLine {
    #[must_use]
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Append a plain argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.tokens.push(ShellToken::new(value));
        self
    }

    /// Append multiple plain arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(values.into_iter().map(ShellToken::new));
        self
    }

    /// Append an explicitly quoted argument.
    #[must_use]
    pub fn quoted(mut self, value: impl Into<String>) -> Self {
        self.tokens.push(ShellToken::quoted(value));
        self
    }

    /// Append a named argument with a separate value token.
    ///
    /// A `None` value drops the pair entirely, so optional settings compose
    /// without branching at the call site.
    #[must_use]
    pub fn named(self, name: &str, value: Option<impl Into<String>>) -> Self {
        self.named_with(name, value, Quoting::Auto)
    }

    /// Like [`CommandLine::named`] with an explicit quoting preference for
    /// the value token.
    #[must_use]
    pub fn named_with(mut self, name: &str, value: Option<impl Into<String>>, quoting: Quoting) -> Self {
        if let Some(value) = value {
            self.tokens.push(ShellToken::new(name));
            self.tokens.push(ShellToken {
                value: value.into(),
                quoting,
            });
        }
        self
    }

    /// Append a flag token only when `enabled` is true.
    #[must_use]
    pub fn flag(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.tokens.push(ShellToken::new(name));
        }
        self
    }

    /// Append pre-built tokens, preserving their quoting preferences.
    #[must_use]
    pub fn extend_tokens<I>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = ShellToken>,
    {
        self.tokens.extend(tokens);
        self
    }

    #[must_use]
    pub fn tokens(&self) -> &[ShellToken] {
        &self.tokens
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Raw argv values for argv-style spawning. No quoting is applied;
    /// arguments cross the process boundary as discrete elements.
    #[must_use]
    pub fn to_argv(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.value.clone()).collect()
    }

    /// Render tokens for display or shell consumption on the given
    /// platform. A token is quoted when explicitly requested or when its
    /// value would not survive the shell unmodified.
    #[must_use]
    pub fn render(&self, platform: Platform) -> Vec<String> {
        self.tokens
            .iter()
            .map(|t| match t.quoting {
                Quoting::Always => quote(&t.value, platform),
                Quoting::Auto if needs_quoting(&t.value) => quote(&t.value, platform),
                Quoting::Auto => t.value.clone(),
            })
            .collect()
    }
}
