//! Diagnostics for the language front end.
//!
//! Two families, both carrying a [`Span`]:
//!
//! - [`ParseError`]: lexical and syntactic problems. The parser recovers
//!   at declaration boundaries and accumulates these, so a single run
//!   reports every syntax error in the file.
//! - [`CheckError`]: name resolution and type rule violations found by
//!   the checker, likewise accumulated over the whole file.
//!
//! `display_with_source` renders the excerpt with a caret underline;
//! plain `Display` gives a one-line `message at line:col`.

use std::fmt;

use hlb_base::{render_snippet, Span};

use crate::types::{ObjType, OptionKind};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Renders the error with the offending source line and an underline.
    pub fn display_with_source(&self, source: &str) -> String {
        format!("error: {}\n\n{}", self.kind, render_snippet(source, self.span))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span.start)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    // Lexical
    UnexpectedCharacter(char),
    UnterminatedString,
    UnterminatedHeredoc { marker: String },
    MalformedNumber { text: String },
    UnknownOptionKind { kind: String },

    // Syntactic
    ExpectedDeclaration { found: String },
    ExpectedToken { expected: &'static str, found: String },
    ExpectedType { found: String },
    ExpectedIdent { found: String },
    ExpectedExpression { found: String },
    ExpectedStatement { found: String },
    ExpectedStatementEnd { found: String },
    HeredocNotLast,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedCharacter(c) => {
                write!(f, "unexpected character {:?}", c)
            }
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            ParseErrorKind::UnterminatedHeredoc { marker } => {
                write!(f, "unterminated heredoc, expected closing '{}'", marker)
            }
            ParseErrorKind::MalformedNumber { text } => {
                write!(f, "malformed integer literal '{}'", text)
            }
            ParseErrorKind::UnknownOptionKind { kind } => {
                write!(f, "unknown option kind 'option::{}'", kind)
            }
            ParseErrorKind::ExpectedDeclaration { found } => {
                write!(f, "expected import, export, or function declaration, found {}", found)
            }
            ParseErrorKind::ExpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseErrorKind::ExpectedType { found } => {
                write!(f, "expected type, found {}", found)
            }
            ParseErrorKind::ExpectedIdent { found } => {
                write!(f, "expected identifier, found {}", found)
            }
            ParseErrorKind::ExpectedExpression { found } => {
                write!(f, "expected expression, found {}", found)
            }
            ParseErrorKind::ExpectedStatement { found } => {
                write!(f, "expected call statement, found {}", found)
            }
            ParseErrorKind::ExpectedStatementEnd { found } => {
                write!(f, "expected ';', newline, or comment after statement, found {}", found)
            }
            ParseErrorKind::HeredocNotLast => {
                write!(f, "heredoc opener must be the last token on its line")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    pub span: Span,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn display_with_source(&self, source: &str) -> String {
        format!(
            "{} error: {}\n\n{}",
            self.kind.category(),
            self.kind,
            render_snippet(source, self.span)
        )
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span.start)
    }
}

impl std::error::Error for CheckError {}

#[derive(Debug, Clone)]
pub enum CheckErrorKind {
    // Name errors
    DuplicateDeclaration { name: String },
    UndefinedIdent { name: String },
    UndefinedExport { name: String },
    NotAnImport { name: String },
    ImportMemberElsewhere { name: String },

    // Type errors
    UnknownBuiltin { block: ObjType, name: String },
    NotCallableInBlock { name: String, block: ObjType },
    SourceInChainPosition { name: String },
    ChainInSourcePosition { name: String },
    StringBlockChained,
    ArityMismatch { name: String, expected: String, found: usize },
    TypeMismatch { expected: ObjType, found: ObjType },
    VariadicRefOutsideVariadic { name: String },
    WithNotAccepted { name: String },
    WithKindMismatch { name: String, expected: OptionKind, found: ObjType },
    BareOptionReturnType { name: String },
    MethodReceiverMismatch { name: String, receiver: ObjType, ret: ObjType },
    AliasNotAllowedHere,
    ImportSourceNotFs { found: ObjType },
}

impl CheckErrorKind {
    /// Diagnostic family, mirroring the NameError/TypeError split of the
    /// language reference.
    pub fn category(&self) -> &'static str {
        match self {
            CheckErrorKind::DuplicateDeclaration { .. }
            | CheckErrorKind::UndefinedIdent { .. }
            | CheckErrorKind::UndefinedExport { .. }
            | CheckErrorKind::NotAnImport { .. }
            | CheckErrorKind::ImportMemberElsewhere { .. } => "name",
            _ => "type",
        }
    }
}

impl fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckErrorKind::DuplicateDeclaration { name } => {
                write!(f, "'{}' is declared more than once in this scope", name)
            }
            CheckErrorKind::UndefinedIdent { name } => {
                write!(f, "'{}' is not declared", name)
            }
            CheckErrorKind::UndefinedExport { name } => {
                write!(f, "export of undeclared name '{}'", name)
            }
            CheckErrorKind::NotAnImport { name } => {
                write!(f, "'{}' is not an import and has no members", name)
            }
            CheckErrorKind::ImportMemberElsewhere { name } => {
                write!(f, "'{}' names an import; reference a member as '{}.<name>'", name, name)
            }
            CheckErrorKind::UnknownBuiltin { block, name } => {
                write!(f, "no builtin '{}' in a {} block", name, block)
            }
            CheckErrorKind::NotCallableInBlock { name, block } => {
                write!(f, "'{}' cannot be called in a {} block", name, block)
            }
            CheckErrorKind::SourceInChainPosition { name } => {
                write!(f, "'{}' establishes a new value and must be the first statement", name)
            }
            CheckErrorKind::ChainInSourcePosition { name } => {
                write!(f, "'{}' transforms an existing value and cannot be the first statement", name)
            }
            CheckErrorKind::StringBlockChained => {
                write!(f, "string blocks hold a single source statement")
            }
            CheckErrorKind::ArityMismatch { name, expected, found } => {
                write!(f, "'{}' expects {} argument(s), found {}", name, expected, found)
            }
            CheckErrorKind::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            CheckErrorKind::VariadicRefOutsideVariadic { name } => {
                write!(f, "variadic parameter '{}' can only spread into a variadic argument", name)
            }
            CheckErrorKind::WithNotAccepted { name } => {
                write!(f, "'{}' does not accept a with clause", name)
            }
            CheckErrorKind::WithKindMismatch { name, expected, found } => {
                write!(f, "'{}' takes option::{} with options, found {}", name, expected, found)
            }
            CheckErrorKind::BareOptionReturnType { name } => {
                write!(f, "function '{}' must name its option kind, e.g. option::run", name)
            }
            CheckErrorKind::MethodReceiverMismatch { name, receiver, ret } => {
                write!(f, "method '{}' receives {} but returns {}", name, receiver, ret)
            }
            CheckErrorKind::AliasNotAllowedHere => {
                write!(f, "'as' aliases are only allowed where the statement produces an fs value")
            }
            CheckErrorKind::ImportSourceNotFs { found } => {
                write!(f, "import source must be an fs block, found {}", found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlb_base::Position;

    fn span(start: usize, end: usize) -> Span {
        Span::new(Position::new(start, 1, start as u32 + 1), Position::new(end, 1, end as u32 + 1))
    }

    #[test]
    fn parse_error_display_includes_position() {
        let err = ParseError::new(ParseErrorKind::UnterminatedString, span(4, 9));
        let text = err.to_string();
        assert!(text.contains("unterminated string"), "{}", text);
        assert!(text.contains("1:5"), "{}", text);
    }

    #[test]
    fn parse_error_display_with_source_underlines() {
        let source = "run \"echo";
        let err = ParseError::new(ParseErrorKind::UnterminatedString, span(4, 9));
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("run \"echo"), "{}", rendered);
        assert!(rendered.contains("^^^^^"), "{}", rendered);
    }

    #[test]
    fn check_error_categories() {
        let name = CheckErrorKind::UndefinedIdent { name: "x".into() };
        let ty = CheckErrorKind::StringBlockChained;
        assert_eq!(name.category(), "name");
        assert_eq!(ty.category(), "type");
    }
}
