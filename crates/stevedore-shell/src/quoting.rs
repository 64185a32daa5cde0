use thiserror::Error;

// ============================================================================
// Platform-Aware Shell Quoting
// ============================================================================

/// Shell dialect used when rendering quoted tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// POSIX shells (bash, sh, zsh): single-quote escaping.
    Posix,
    /// Windows `cmd.exe` style: double-quote escaping.
    Windows,
}

impl Platform {
    /// The dialect of the host platform.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Errors from [`unquote`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuoteError {
    #[error("unterminated quoted token: {token}")]
    Unterminated { token: String },
}

/// Characters that force quoting on top of plain whitespace.
const SHELL_META: &[char] = &[
    '"', '\'', '`', '$', '&', '|', ';', '<', '>', '(', ')', '*', '?', '{', '}', '[', ']', '!',
    '#', '~', '^', '%',
];

/// Whether a literal value needs quoting to survive a shell unmodified.
///
/// Empty strings, whitespace, and shell metacharacters all require quoting.
#[must_use]
pub fn needs_quoting(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| c.is_whitespace() || SHELL_META.contains(&c))
}

/// Quote a literal value for the given platform.
///
/// The result always round-trips: `unquote(&quote(v, p), p) == v` for any
/// literal `v` on the same platform `p`.
///
/// - POSIX: wraps in single quotes; embedded `'` becomes `'\''`.
/// - Windows: wraps in double quotes; embedded `"` is doubled (`""`),
///   the `cmd.exe` convention.
#[must_use]
pub fn quote(value: &str, platform: Platform) -> String {
    match platform {
        Platform::Posix => format!("'{}'", value.replace('\'', "'\\''")),
        Platform::Windows => format!("\"{}\"", value.replace('"', "\"\"")),
    }
}

/// Reverse [`quote`] on the same platform.
///
/// Tokens that are not wrapped in the platform's quote character are
/// returned unchanged. A token that opens a quote without closing it is
/// malformed input.
pub fn unquote(token: &str, platform: Platform) -> Result<String, QuoteError> {
    let quote_char = match platform {
        Platform::Posix => '\'',
        Platform::Windows => '"',
    };

    if !token.starts_with(quote_char) {
        return Ok(token.to_string());
    }
    if token.len() < 2 || !token.ends_with(quote_char) {
        return Err(QuoteError::Unterminated {
            token: token.to_string(),
        });
    }

    let inner = &token[1..token.len() - 1];
    let restored = match platform {
        Platform::Posix => inner.replace("'\\''", "'"),
        Platform::Windows => inner.replace("\"\"", "\""),
    };
    Ok(restored)
}
