//! Byte-level lexer for HLB source text.
//!
//! Produces a flat token stream with precise spans. Two things are unusual
//! compared to a whitespace-discarding lexer:
//!
//! - **Newlines and comments are tokens.** A newline or trailing comment
//!   terminates a call statement, and comment runs become doc comments, so
//!   both survive into the parser.
//! - **Heredocs are single string tokens.** `<<EOM`, `<<~EOM`, and `<<-EOM`
//!   openers swallow everything up to the closing marker line and carry the
//!   processed body as one `Str` token; the raw text is kept verbatim for
//!   the formatter.
//!
//! The lexer never aborts. Malformed input becomes a `Bad` token plus a
//! diagnostic, and scanning continues, so the parser can report every
//! problem in a file in one pass.

use hlb_base::{Position, Span};
use log::debug;

use crate::error::{ParseError, ParseErrorKind};
use crate::token::{Keyword, Token, TokenKind};
use crate::types::{ObjType, OptionKind};

/// Tokenizes `source`, returning the token stream (always terminated by an
/// `Eof` token) and any lexical diagnostics.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    let mut lexer = Lexer::new(source);
    lexer.run();
    debug!(
        "lexed {} tokens, {} lexical error(s)",
        lexer.tokens.len(),
        lexer.errors.len()
    );
    (lexer.tokens, lexer.errors)
}

/// How a heredoc marker transforms the body's leading whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeredocStrip {
    /// `<<EOM`: body kept verbatim.
    None,
    /// `<<~EOM`: all leading whitespace removed from every line.
    All,
    /// `<<-EOM`: the common run of leading tabs removed from every line.
    CommonTabs,
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.offset + n).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    /// Consumes one full UTF-8 character and returns it.
    fn bump_char(&mut self) -> Option<char> {
        let c = self.source[self.offset..].chars().next()?;
        for _ in 0..c.len_utf8() {
            self.bump();
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: Position) {
        let text = self.source[start.offset..self.offset].to_string();
        self.tokens.push(Token::new(kind, text, Span::new(start, self.pos())));
    }

    fn error(&mut self, kind: ParseErrorKind, start: Position) {
        self.errors.push(ParseError::new(kind, Span::new(start, self.pos())));
    }

    fn run(&mut self) {
        while let Some(b) = self.peek() {
            let start = self.pos();
            match b {
                b'\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, start);
                }
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                }
                b'#' => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.bump();
                    }
                    self.push(TokenKind::Comment, start);
                }
                b'"' => self.quoted_string(start),
                b'\'' => self.raw_string(start),
                b'<' if self.peek_at(1) == Some(b'<') => self.heredoc(start),
                b'{' => self.operator(TokenKind::LBrace, start),
                b'}' => self.operator(TokenKind::RBrace, start),
                b'(' => self.operator(TokenKind::LParen, start),
                b')' => self.operator(TokenKind::RParen, start),
                b',' => self.operator(TokenKind::Comma, start),
                b';' => self.operator(TokenKind::Semi, start),
                b'0'..=b'9' => self.number(start),
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.word(start),
                _ => {
                    // Safe: offset always lands on a char boundary.
                    let c = self.bump_char().unwrap_or('\u{fffd}');
                    self.push(TokenKind::Bad, start);
                    self.error(ParseErrorKind::UnexpectedCharacter(c), start);
                }
            }
        }
        let end = self.pos();
        self.tokens.push(Token::new(TokenKind::Eof, "", Span::new(end, end)));
    }

    fn operator(&mut self, kind: TokenKind, start: Position) {
        self.bump();
        self.push(kind, start);
    }

    fn quoted_string(&mut self, start: Position) {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.push(TokenKind::Bad, start);
                    self.error(ParseErrorKind::UnterminatedString, start);
                    return;
                }
                Some(b'"') => {
                    self.bump();
                    self.push(TokenKind::Str(value), start);
                    return;
                }
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        Some(b'n') => {
                            self.bump();
                            value.push('\n');
                        }
                        Some(b't') => {
                            self.bump();
                            value.push('\t');
                        }
                        Some(b'r') => {
                            self.bump();
                            value.push('\r');
                        }
                        Some(b'\\') => {
                            self.bump();
                            value.push('\\');
                        }
                        Some(b'"') => {
                            self.bump();
                            value.push('"');
                        }
                        // Unknown escapes pass through verbatim.
                        _ => value.push('\\'),
                    }
                }
                Some(_) => {
                    if let Some(c) = self.bump_char() {
                        value.push(c);
                    }
                }
            }
        }
    }

    fn raw_string(&mut self, start: Position) {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.push(TokenKind::Bad, start);
                    self.error(ParseErrorKind::UnterminatedString, start);
                    return;
                }
                Some(b'\'') => {
                    self.bump();
                    self.push(TokenKind::Str(value), start);
                    return;
                }
                Some(_) => {
                    if let Some(c) = self.bump_char() {
                        value.push(c);
                    }
                }
            }
        }
    }

    fn heredoc(&mut self, start: Position) {
        self.bump();
        self.bump(); // <<
        let strip = match self.peek() {
            Some(b'~') => {
                self.bump();
                HeredocStrip::All
            }
            Some(b'-') => {
                self.bump();
                HeredocStrip::CommonTabs
            }
            _ => HeredocStrip::None,
        };

        let marker_start = self.offset;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        let marker = self.source[marker_start..self.offset].to_string();
        if marker.is_empty() {
            self.push(TokenKind::Bad, start);
            self.error(ParseErrorKind::UnexpectedCharacter('<'), start);
            return;
        }

        // The opener must end its line; the body starts on the next one.
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\r')) {
            self.bump();
        }
        match self.peek() {
            Some(b'\n') => {
                self.bump();
            }
            _ => {
                self.push(TokenKind::Bad, start);
                self.error(ParseErrorKind::HeredocNotLast, start);
                return;
            }
        }

        let mut lines: Vec<&'a str> = Vec::new();
        loop {
            if self.peek().is_none() {
                self.push(TokenKind::Bad, start);
                self.error(ParseErrorKind::UnterminatedHeredoc { marker }, start);
                return;
            }
            let line_start = self.offset;
            while self.peek().is_some_and(|b| b != b'\n') {
                self.bump();
            }
            let line = &self.source[line_start..self.offset];
            if line.trim() == marker {
                // Leave the trailing newline for a Newline token so the
                // enclosing statement still sees its terminator.
                break;
            }
            lines.push(line);
            if self.peek().is_none() {
                self.push(TokenKind::Bad, start);
                self.error(ParseErrorKind::UnterminatedHeredoc { marker }, start);
                return;
            }
            self.bump(); // newline
        }

        let value = process_heredoc(&lines, strip);
        self.push(TokenKind::Str(value), start);
    }

    fn number(&mut self, start: Position) {
        let first = self.peek();
        if first == Some(b'0')
            && matches!(
                self.peek_at(1),
                Some(b'b') | Some(b'B') | Some(b'o') | Some(b'O') | Some(b'x') | Some(b'X')
            )
        {
            self.bump();
            self.bump(); // 0 and radix marker
            let digits_start = self.offset;
            while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.bump();
            }
            let no_digits = self.offset == digits_start;
            if no_digits || self.peek().is_some_and(is_ident_continue) {
                while self.peek().is_some_and(is_ident_continue) {
                    self.bump();
                }
                let text = self.source[start.offset..self.offset].to_string();
                self.push(TokenKind::Bad, start);
                self.error(ParseErrorKind::MalformedNumber { text }, start);
                return;
            }
            self.push(TokenKind::Numeric, start);
            return;
        }

        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.source[start.offset..self.offset];
        let leading_zero = text.len() > 1 && text.starts_with('0');
        if leading_zero || self.peek().is_some_and(is_ident_continue) {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            let text = self.source[start.offset..self.offset].to_string();
            self.push(TokenKind::Bad, start);
            self.error(ParseErrorKind::MalformedNumber { text }, start);
            return;
        }
        self.push(TokenKind::Decimal, start);
    }

    fn word(&mut self, start: Position) {
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        let text = &self.source[start.offset..self.offset];

        if text == "option" && self.peek() == Some(b':') && self.peek_at(1) == Some(b':') {
            self.bump();
            self.bump();
            let kind_start = self.offset;
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            let kind_text = self.source[kind_start..self.offset].to_string();
            match OptionKind::parse(&kind_text) {
                Some(kind) => {
                    self.push(TokenKind::TypeName(ObjType::Option(Some(kind))), start)
                }
                None => {
                    self.push(TokenKind::Bad, start);
                    self.error(ParseErrorKind::UnknownOptionKind { kind: kind_text }, start);
                }
            }
            return;
        }

        if let Some(kw) = Keyword::parse(text) {
            self.push(TokenKind::Keyword(kw), start);
            return;
        }
        match text {
            "true" => {
                self.push(TokenKind::Bool(true), start);
                return;
            }
            "false" => {
                self.push(TokenKind::Bool(false), start);
                return;
            }
            _ => {}
        }
        if let Some(ty) = ObjType::parse(text) {
            self.push(TokenKind::TypeName(ty), start);
            return;
        }

        // One dotted segment is allowed, reserved for import members.
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(is_ident_start) {
            self.bump(); // dot
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
        }
        self.push(TokenKind::Ident, start);
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn process_heredoc(lines: &[&str], strip: HeredocStrip) -> String {
    let stripped: Vec<String> = match strip {
        HeredocStrip::None => lines.iter().map(|l| l.to_string()).collect(),
        HeredocStrip::All => lines.iter().map(|l| l.trim_start().to_string()).collect(),
        HeredocStrip::CommonTabs => {
            let common = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.bytes().take_while(|&b| b == b'\t').count())
                .min()
                .unwrap_or(0);
            lines
                .iter()
                .map(|l| {
                    let skip = l
                        .bytes()
                        .take_while(|&b| b == b'\t')
                        .count()
                        .min(common);
                    l[skip..].to_string()
                })
                .collect()
        }
    };
    let mut value = stripped.join("\n");
    if !value.is_empty() {
        value.push('\n');
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn first_string(source: &str) -> String {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);
        tokens
            .into_iter()
            .find_map(|t| match t.kind {
                TokenKind::Str(value) => Some(value),
                _ => None,
            })
            .expect("no string token")
    }

    #[test]
    fn lexes_call_statement() {
        assert_eq!(
            kinds("image \"alpine\"\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Str("alpine".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_types() {
        assert_eq!(
            kinds("fs default(variadic string args)"),
            vec![
                TokenKind::TypeName(ObjType::Fs),
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Keyword(Keyword::Variadic),
                TokenKind::TypeName(ObjType::Str),
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_option_subtype() {
        assert_eq!(
            kinds("option::run"),
            vec![
                TokenKind::TypeName(ObjType::Option(Some(OptionKind::Run))),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unknown_option_subtype_is_bad() {
        let (tokens, errors) = tokenize("option::volume");
        assert_eq!(tokens[0].kind, TokenKind::Bad);
        assert!(matches!(
            errors[0].kind,
            ParseErrorKind::UnknownOptionKind { .. }
        ));
    }

    #[test]
    fn lexes_bools_and_idents() {
        assert_eq!(
            kinds("true false readonlyRootfs"),
            vec![
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_dotted_ident_as_single_token() {
        let (tokens, _) = tokenize("node.build");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].text, "node.build");
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(first_string(r#""a\tb\n\"c\"\\""#), "a\tb\n\"c\"\\");
    }

    #[test]
    fn raw_string_keeps_backslashes() {
        assert_eq!(first_string(r"'a\tb'"), r"a\tb");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, errors) = tokenize("run \"echo\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Bad));
        assert!(matches!(errors[0].kind, ParseErrorKind::UnterminatedString));
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("0 42 0o755 0x1F 0b101"),
            vec![
                TokenKind::Decimal,
                TokenKind::Decimal,
                TokenKind::Numeric,
                TokenKind::Numeric,
                TokenKind::Numeric,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn leading_zero_decimal_is_malformed() {
        let (tokens, errors) = tokenize("0755");
        assert_eq!(tokens[0].kind, TokenKind::Bad);
        assert!(matches!(errors[0].kind, ParseErrorKind::MalformedNumber { .. }));
    }

    #[test]
    fn radix_prefix_without_digits_is_malformed() {
        let (_, errors) = tokenize("0x");
        assert!(matches!(errors[0].kind, ParseErrorKind::MalformedNumber { .. }));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let (tokens, _) = tokenize("scratch # the empty fs\n");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].text, "# the empty fs");
        assert_eq!(tokens[2].kind, TokenKind::Newline);
    }

    #[test]
    fn heredoc_plain_keeps_body() {
        let source = "run <<EOM\n\techo hi\nEOM\n";
        assert_eq!(first_string(source), "\techo hi\n");
    }

    #[test]
    fn heredoc_tilde_strips_all_leading_whitespace() {
        let source = "run <<~EOM\n\t  echo one\n\t\techo two\nEOM\n";
        assert_eq!(first_string(source), "echo one\necho two\n");
    }

    #[test]
    fn heredoc_dash_strips_common_tabs() {
        let source = "run <<-EOM\n\t\techo one\n\t\t\techo two\nEOM\n";
        assert_eq!(first_string(source), "echo one\n\techo two\n");
    }

    #[test]
    fn heredoc_with_nested_quotes() {
        let source = "run <<EOM\necho \"hi there\"\nEOM\n";
        assert_eq!(first_string(source), "echo \"hi there\"\n");
    }

    #[test]
    fn heredoc_terminator_line_may_be_indented() {
        let source = "run <<EOM\nbody\n  EOM\n";
        assert_eq!(first_string(source), "body\n");
    }

    #[test]
    fn unterminated_heredoc_is_reported() {
        let (_, errors) = tokenize("run <<EOM\nbody\n");
        assert!(matches!(
            errors[0].kind,
            ParseErrorKind::UnterminatedHeredoc { .. }
        ));
    }

    #[test]
    fn heredoc_keeps_newline_terminator_for_statement() {
        let (tokens, errors) = tokenize("run <<EOM\nhi\nEOM\n");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert!(matches!(kinds[1], TokenKind::Str(_)));
        assert!(matches!(kinds[2], TokenKind::Newline));
    }

    #[test]
    fn spans_are_monotonic() {
        let (tokens, _) = tokenize("fs default() {\n\timage \"alpine\"\n}\n");
        for pair in tokens.windows(2) {
            assert!(
                pair[0].span.end.offset <= pair[1].span.start.offset,
                "overlapping spans: {:?} then {:?}",
                pair[0],
                pair[1]
            );
        }
        for tok in &tokens {
            assert!(tok.span.start.offset <= tok.span.end.offset);
        }
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let (tokens, _) = tokenize("a\nbb\n");
        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[0].span.start.column, 1);
        // `bb` starts line 2, column 1.
        assert_eq!(tokens[2].span.start.line, 2);
        assert_eq!(tokens[2].span.start.column, 1);
        assert_eq!(tokens[2].span.end.column, 3);
    }

    #[test]
    fn unexpected_character_is_bad() {
        let (tokens, errors) = tokenize("scratch @\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Bad));
        assert!(matches!(
            errors[0].kind,
            ParseErrorKind::UnexpectedCharacter('@')
        ));
    }
}
