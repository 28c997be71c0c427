//! Errors produced while generating the build graph.
//!
//! Unlike parse and check diagnostics, which accumulate, generation
//! aborts on the first failure: a half-evaluated graph is not useful to
//! anyone. [`EvalError`]s carry the span of the offending statement or
//! argument.

use std::fmt;

use hlb_base::{render_snippet, Span};

#[derive(Debug, Clone)]
pub enum GenError {
    /// The requested target is not an `fs` function callable with no
    /// arguments.
    InvalidTarget { name: String },
    /// The import resolver failed or returned an unusable file.
    Import { alias: String, reason: String, span: Span },
    /// A runtime condition during evaluation.
    Eval(EvalError),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::InvalidTarget { name } => {
                write!(f, "target '{}' is not an fs function with no parameters", name)
            }
            GenError::Import { alias, reason, span } => {
                write!(f, "import '{}' failed at {}: {}", alias, span.start, reason)
            }
            GenError::Eval(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for GenError {}

impl From<EvalError> for GenError {
    fn from(e: EvalError) -> Self {
        GenError::Eval(e)
    }
}

#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn display_with_source(&self, source: &str) -> String {
        format!("error: {}\n\n{}", self.kind, render_snippet(source, self.span))
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span.start)
    }
}

impl std::error::Error for EvalError {}

#[derive(Debug, Clone)]
pub enum EvalErrorKind {
    BadTimestamp { value: String },
    UnknownNetworkMode { value: String },
    UnknownSecurityMode { value: String },
    UnknownCacheSharing { value: String },
    BadFileMode { value: i64 },
    BadId { value: i64 },
    FormatArgumentCount { expected: usize, found: usize },
    FormatBadDirective { directive: String },
    FormatBadInt { value: String },
    /// An alias referenced before the statement that binds it ran.
    AliasUnbound { name: String },
    RecursionLimit { limit: usize },
    NotExported { alias: String, name: String },
    WrongArity { name: String, expected: usize, found: usize },
    WrongType { name: String, expected: String, found: String },
    /// An internal invariant failed, typically because an unchecked file
    /// reached the evaluator.
    Internal { message: String },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalErrorKind::BadTimestamp { value } => {
                write!(f, "'{}' is not an RFC 3339 timestamp", value)
            }
            EvalErrorKind::UnknownNetworkMode { value } => {
                write!(f, "unknown network mode '{}', expected unset, host, or node", value)
            }
            EvalErrorKind::UnknownSecurityMode { value } => {
                write!(f, "unknown security mode '{}', expected sandbox or insecure", value)
            }
            EvalErrorKind::UnknownCacheSharing { value } => {
                write!(f, "unknown cache sharing mode '{}', expected shared, private, or locked", value)
            }
            EvalErrorKind::BadFileMode { value } => {
                write!(f, "{:#o} is not a valid file mode", value)
            }
            EvalErrorKind::BadId { value } => {
                write!(f, "{} is not a valid uid/gid", value)
            }
            EvalErrorKind::FormatArgumentCount { expected, found } => {
                write!(f, "format string expects {} value(s), found {}", expected, found)
            }
            EvalErrorKind::FormatBadDirective { directive } => {
                write!(f, "unsupported format directive '%{}'", directive)
            }
            EvalErrorKind::FormatBadInt { value } => {
                write!(f, "'%d' requires an integer, found '{}'", value)
            }
            EvalErrorKind::AliasUnbound { name } => {
                write!(f, "alias '{}' has not been produced yet", name)
            }
            EvalErrorKind::RecursionLimit { limit } => {
                write!(f, "recursion limit of {} calls exceeded", limit)
            }
            EvalErrorKind::NotExported { alias, name } => {
                write!(f, "'{}' is not exported by import '{}'", name, alias)
            }
            EvalErrorKind::WrongArity { name, expected, found } => {
                write!(f, "'{}' expects {} argument(s), found {}", name, expected, found)
            }
            EvalErrorKind::WrongType { name, expected, found } => {
                write!(f, "'{}' expects {}, found {}", name, expected, found)
            }
            EvalErrorKind::Internal { message } => {
                write!(f, "internal error: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlb_base::Position;

    #[test]
    fn eval_error_displays_position() {
        let err = EvalError::new(
            EvalErrorKind::UnknownNetworkMode { value: "bridge".into() },
            Span::new(Position::new(10, 2, 3), Position::new(18, 2, 11)),
        );
        let text = err.to_string();
        assert!(text.contains("bridge"), "{}", text);
        assert!(text.contains("2:3"), "{}", text);
    }

    #[test]
    fn gen_error_wraps_eval_error() {
        let err: GenError = EvalError::new(
            EvalErrorKind::RecursionLimit { limit: 512 },
            Span::default(),
        )
        .into();
        assert!(err.to_string().contains("recursion limit"));
    }
}
