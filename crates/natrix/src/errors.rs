//! Structured diagnostics for every pipeline stage.
//!
//! Each stage constructs an [`Error`] carrying a typed [`ErrorKind`], a
//! human message, and the source range of the offending tokens. The chunk
//! driver renders errors with [`Error::render`], which produces the
//! snippet-and-caret form shown to users.

use std::fmt::{self, Write};

use strum::{Display, EnumString, IntoStaticStr};

use crate::token::CodeRange;

/// Result type alias for operations that can produce a diagnostic.
pub type EvalResult<T> = Result<T, Error>;

/// Every error class the interpreter can report.
///
/// Uses strum derives so the variant name doubles as the user-facing
/// error name (e.g. `ZeroDivisionError` renders as "ZeroDivisionError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    // --- Tokenizer ---
    /// A character that starts no token in the subset.
    UnknownTokenError,
    /// A string literal left open at a newline or end of file.
    UnterminatedStringError,
    /// A numeric literal with a malformed shape (`0x`, `1e`, `1__2`, ...).
    InvalidNumberError,
    /// Indentation that is not a multiple of four or dedents to no
    /// enclosing level.
    IndentationError,
    /// A keyword outside the teaching subset (`yield`, `with`, ...).
    ForbiddenIdentifierError,
    /// An operator outside the teaching subset (`@`, `|`, `+=`, ...).
    ForbiddenOperatorError,
    /// A closing bracket with no matching opener.
    MatchingBracketError,
    /// An escape sequence the subset does not recognize.
    UnsupportedEscapeError,

    // --- Parser ---
    /// The parser required a specific token and saw something else.
    ExpectedTokenError,
    /// An `if`/`elif` without an `else` or `elif` continuation.
    NoElseBlockError,
    /// Any other syntax fault.
    GenericUnexpectedSyntaxError,

    // --- Resolver ---
    /// A name that is not visible anywhere up the scope chain.
    NameNotFoundError,
    /// A second binding of a name already defined in the same frame, or
    /// a rebinding of an enclosing function's name without `nonlocal`.
    NameReassignmentError,

    // --- Runtime ---
    /// An operator applied to operand types it does not support.
    UnsupportedOperandTypeError,
    /// A call with the wrong number or kinds of arguments.
    UnsupportedArgumentError,
    /// Division or modulo by zero, in any numeric tower.
    ZeroDivisionError,
    /// A local variable read before its assignment has executed.
    UnboundLocalError,
    /// A name that resolved statically but is absent at runtime.
    NameError,
    /// An assert statement whose condition evaluated falsy.
    AssertionError,
    /// The configured step budget was exhausted.
    StepLimitExceededError,

    // --- Modules ---
    /// The module loader could not be reached or refused the module.
    ModuleConnectionError,
    /// The module loaded but misbehaved (bad export, marshal failure).
    ModuleInternalError,
}

impl ErrorKind {
    /// True for errors raised while the machine is running, as opposed to
    /// the static tokenize/parse/resolve stages.
    #[must_use]
    pub fn is_runtime(self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperandTypeError
                | Self::UnsupportedArgumentError
                | Self::ZeroDivisionError
                | Self::UnboundLocalError
                | Self::NameError
                | Self::AssertionError
                | Self::StepLimitExceededError
                | Self::ModuleConnectionError
                | Self::ModuleInternalError
        )
    }
}

/// A structured diagnostic: error class, message, location, and an
/// optional "did you mean" suggestion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub range: CodeRange,
    pub suggestion: Option<String>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, range: CodeRange) -> Self {
        Self {
            kind,
            message: message.into(),
            range,
            suggestion: None,
        }
    }

    /// Attaches a name suggestion, rendered as a trailing
    /// "Perhaps you meant to type '…'?" line.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Renders the full diagnostic against the source the error came from:
    ///
    /// ```text
    /// ZeroDivisionError at line 4
    ///
    /// >>> x = 1 / 0
    ///     ~~~~^~~~~
    /// division by zero
    /// ```
    ///
    /// The caret row marks the error's columns with `^` and pads the rest
    /// of the line with `~`.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        let line_number = self.range.start().line;
        let _ = writeln!(out, "{} at line {line_number}", self.kind);

        if let Some(line) = source.lines().nth(line_number.saturating_sub(1) as usize) {
            out.push('\n');
            let _ = writeln!(out, ">>> {line}");
            out.push_str("    ");
            let start_col = self.range.start().column as usize;
            let end_col = if self.range.end().line == line_number {
                (self.range.end().column as usize).max(start_col + 1)
            } else {
                line.chars().count()
            };
            for (col, _) in line.chars().enumerate() {
                out.push(if (start_col..end_col).contains(&col) { '^' } else { '~' });
            }
            // Errors at end of line (e.g. an unterminated string) point one
            // past the last character.
            if start_col >= line.chars().count() {
                out.push('^');
            }
            out.push('\n');
        }

        out.push_str(&self.message);
        if let Some(suggestion) = &self.suggestion {
            let _ = write!(out, "\nPerhaps you meant to type '{suggestion}'?");
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}: {}",
            self.kind,
            self.range.start().line,
            self.message
        )
    }
}

impl std::error::Error for Error {}
