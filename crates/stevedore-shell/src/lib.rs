//! Shell-safe command line composition for stevedore
//!
//! Commands are built from declarative fragments (plain arguments, named
//! arguments with a separate value, explicitly quoted arguments) into an
//! ordered token list. Tokens carry their quoting preference so that the
//! same [`CommandLine`] can be handed to an argv-style spawn (raw values,
//! no shell interpretation) or rendered as a display string with
//! platform-correct quoting.
//!
//! # Security Model
//!
//! Quoting here is for *rendering only*. Process execution always receives
//! the raw token values as discrete argv elements; no shell string is ever
//! evaluated.

pub mod compose;
pub mod quoting;

pub use compose::{CommandLine, Quoting, ShellToken};
pub use quoting::{Platform, QuoteError, needs_quoting, quote, unquote};
