//! Token types for the HLB lexer and parser.
//!
//! Tokens are the atomic syntactic units produced by the lexer. Unlike most
//! languages, newlines and comments are real tokens here: a newline (or a
//! trailing comment) terminates a call statement, and comment groups are
//! carried through to the CST as doc comments and trivia.
//!
//! Every token stores the raw source text it was lexed from, so the
//! formatter can reproduce string escapes, heredocs, and integer literals
//! exactly as written.

use hlb_base::Span;

use crate::types::ObjType;

/// Reserved words of the statement grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `with` introduces an options clause on a call.
    With,
    /// `as` binds the statement's intermediate value to a name.
    As,
    /// `variadic` marks a trailing parameter as zero-or-more.
    Variadic,
}

impl Keyword {
    pub fn parse(text: &str) -> Option<Keyword> {
        Some(match text {
            "with" => Keyword::With,
            "as" => Keyword::As,
            "variadic" => Keyword::Variadic,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::With => "with",
            Keyword::As => "as",
            Keyword::Variadic => "variadic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// A type name, including the `option::<kind>` form.
    TypeName(ObjType),
    /// `0 | [1-9][0-9]*`
    Decimal,
    /// `0[bBoOxX]` radix-prefixed integer.
    Numeric,
    /// String literal; the payload is the decoded value. Covers quoted
    /// strings and all heredoc forms.
    Str(String),
    Bool(bool),
    Ident,
    Newline,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Semi,
    /// `#` to end of line; the raw text includes the `#`.
    Comment,
    /// Anything the lexer could not classify.
    Bad,
    Eof,
}

impl TokenKind {
    /// Human-readable category name, used in "expected X, found Y"
    /// diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Keyword(k) => k.as_str(),
            TokenKind::TypeName(_) => "type",
            TokenKind::Decimal | TokenKind::Numeric => "integer",
            TokenKind::Str(_) => "string",
            TokenKind::Bool(_) => "bool",
            TokenKind::Ident => "identifier",
            TokenKind::Newline => "newline",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Semi => "';'",
            TokenKind::Comment => "comment",
            TokenKind::Bad => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token, verbatim.
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token { kind, text: text.into(), span }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    /// True for the tokens that can terminate a call statement.
    pub fn ends_stmt(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Semi | TokenKind::Newline | TokenKind::Comment | TokenKind::Eof
        )
    }
}
