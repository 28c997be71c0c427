//! Recursive-descent parser producing the HLB concrete syntax tree.
//!
//! Grammar (trivia omitted):
//!
//! ```text
//! File       := Decl*
//! Decl       := ImportDecl | ExportDecl | FuncDecl | BadDecl
//! ImportDecl := "import" Ident "from" FuncLit
//! ExportDecl := "export" Ident
//! FuncDecl   := Type Method? Ident FieldList BlockStmt?
//! Method     := "(" Type ")"
//! FieldList  := "(" ( Field ( "," Field )* ","? )? ")"
//! Field      := "variadic"? Type Ident
//! BlockStmt  := "{" Stmt* "}"
//! Stmt       := CallStmt | Newline | CommentGroup
//! CallStmt   := Ident Expr* WithOpt? AliasDecl? StmtEnd
//! WithOpt    := "with" ( Ident | FuncLit )
//! AliasDecl  := "as" Ident
//! StmtEnd    := ";" | Newline | Comment
//! Expr       := Ident | BasicLit | FuncLit
//! FuncLit    := Type BlockStmt
//! ```
//!
//! Errors are recovered at declaration granularity: a syntax error turns
//! the surrounding declaration into a [`BadDecl`] and parsing resumes at
//! the next line that can start a declaration, so one run reports every
//! syntax error in the file. Inside blocks, recovery is per statement.
//!
//! A comment group whose last line immediately precedes a declaration or
//! statement (no blank line between) is attached as that node's doc.

use hlb_base::{Position, Span};
use log::debug;

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::tokenize;
use crate::token::{Keyword, Token, TokenKind};

/// Parses `source` into a [`File`], accumulating every lexical and
/// syntactic diagnostic instead of stopping at the first.
pub fn parse(source: &str, filename: &str) -> (File, Vec<ParseError>) {
    let (tokens, lex_errors) = tokenize(source);
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        errors: lex_errors,
        next_call_id: 0,
    };
    let decls = parser.decls();
    debug!(
        "parsed {}: {} decl(s), {} error(s)",
        filename,
        decls.len(),
        parser.errors.len()
    );
    (
        File {
            filename: filename.to_string(),
            decls,
            scope: Default::default(),
        },
        parser.errors,
    )
}

type Parsed<T> = Result<T, ParseError>;

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    next_call_id: CallId,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// "found ..." text for diagnostics; identifiers include their name.
    fn found(&self) -> String {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Ident => format!("'{}'", tok.text),
            _ => tok.kind.describe().to_string(),
        }
    }

    fn here(&self) -> Span {
        self.peek().span
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.here())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn decls(&mut self) -> Vec<Decl> {
        let mut decls = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    if let Some(trivia) = self.newline_run() {
                        decls.push(Decl::Newline(trivia));
                    }
                }
                TokenKind::Comment => {
                    let group = self.comment_group();
                    if self.starts_decl() {
                        decls.push(self.decl(Some(group)));
                    } else {
                        decls.push(Decl::Comment(group));
                    }
                }
                TokenKind::Bad => {
                    // Lexical error already reported; just skip the line.
                    let start = self.here().start;
                    decls.push(self.recover_decl(start));
                }
                _ if self.starts_decl() => decls.push(self.decl(None)),
                _ => {
                    let start = self.here().start;
                    self.errors
                        .push(self.err(ParseErrorKind::ExpectedDeclaration { found: self.found() }));
                    decls.push(self.recover_decl(start));
                }
            }
        }
        decls
    }

    fn starts_decl(&self) -> bool {
        match self.peek().kind.clone() {
            TokenKind::TypeName(_) => true,
            TokenKind::Ident => matches!(self.peek().text.as_str(), "import" | "export"),
            _ => false,
        }
    }

    fn decl(&mut self, doc: Option<CommentGroup>) -> Decl {
        let start = self.here().start;
        let result = match self.peek().kind.clone() {
            TokenKind::Ident if self.peek().text == "import" => self.import_decl(doc),
            TokenKind::Ident if self.peek().text == "export" => self.export_decl(doc),
            _ => self.func_decl(doc),
        };
        match result {
            Ok(decl) => decl,
            Err(error) => {
                self.errors.push(error);
                self.recover_decl(start)
            }
        }
    }

    /// Skips to the next line that can start a declaration, balancing
    /// braces so a malformed function body is swallowed whole.
    fn recover_decl(&mut self, start: Position) -> Decl {
        let mut depth = 0usize;
        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => break,
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                }
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        let end = self.here().start;
        let text = self.source[start.offset..end.offset.max(start.offset)].to_string();
        Decl::Bad(BadDecl { text, span: Span::new(start, end) })
    }

    fn import_decl(&mut self, doc: Option<CommentGroup>) -> Parsed<Decl> {
        let start = self.here().start;
        self.advance(); // import
        let name = self.plain_ident()?;
        let from = self.advance();
        if !(from.kind == TokenKind::Ident && from.text == "from") {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedToken { expected: "'from'", found: from.kind.describe().to_string() },
                from.span,
            ));
        }
        let lit = self.func_lit()?;
        let span = Span::new(start, lit.span.end);
        Ok(Decl::Import(ImportDecl { doc, name, from: lit, span }))
    }

    fn export_decl(&mut self, doc: Option<CommentGroup>) -> Parsed<Decl> {
        let start = self.here().start;
        self.advance(); // export
        let name = self.plain_ident()?;
        let span = Span::new(start, name.span.end);
        Ok(Decl::Export(ExportDecl { doc, name, span }))
    }

    fn func_decl(&mut self, doc: Option<CommentGroup>) -> Parsed<Decl> {
        let start = self.here().start;
        let ret = self.type_node()?;
        let method = if self.peek().kind == TokenKind::LParen && self.method_ahead() {
            self.advance(); // (
            let ty = self.type_node()?;
            self.expect(TokenKind::RParen, "')'")?;
            Some(ty)
        } else {
            None
        };
        let name = self.plain_ident()?;
        let params = self.field_list()?;
        let (body, end) = if self.peek().kind == TokenKind::LBrace {
            let block = self.block()?;
            let end = block.span.end;
            (Some(block), end)
        } else {
            (None, self.prev_end())
        };
        Ok(Decl::Func(FuncDecl {
            doc,
            ret,
            method,
            name,
            params,
            body,
            span: Span::new(start, end),
        }))
    }

    /// Distinguishes a method receiver `(fs)` from a field list: a
    /// receiver is a lone type between the parens, before the name.
    fn method_ahead(&self) -> bool {
        matches!(
            self.peek_next().map(|t| &t.kind),
            Some(TokenKind::TypeName(_))
        )
    }

    fn field_list(&mut self) -> Parsed<Vec<Field>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut fields = Vec::new();
        self.skip_paren_trivia();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(fields);
        }
        loop {
            let start = self.here().start;
            let variadic = if self.peek().is_keyword(Keyword::Variadic) {
                self.advance();
                true
            } else {
                false
            };
            let ty = self.type_node()?;
            let name = self.plain_ident()?;
            let span = Span::new(start, name.span.end);
            fields.push(Field { variadic, ty, name, span });
            self.skip_paren_trivia();
            match self.peek().kind.clone() {
                TokenKind::Comma => {
                    self.advance();
                    self.skip_paren_trivia();
                    if self.peek().kind == TokenKind::RParen {
                        self.advance();
                        break;
                    }
                }
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(self.err(ParseErrorKind::ExpectedToken {
                        expected: "',' or ')'",
                        found: self.found(),
                    }))
                }
            }
        }
        Ok(fields)
    }

    fn skip_paren_trivia(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Comment) {
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn block(&mut self) -> Parsed<BlockStmt> {
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        let start = open.span.start;
        let mut stmts = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    let close = self.advance();
                    return Ok(BlockStmt { stmts, span: Span::new(start, close.span.end) });
                }
                TokenKind::Eof => {
                    return Err(self.err(ParseErrorKind::ExpectedToken {
                        expected: "'}'",
                        found: self.found(),
                    }))
                }
                TokenKind::Newline => {
                    if let Some(trivia) = self.newline_run() {
                        stmts.push(Stmt::Newline(trivia));
                    }
                }
                TokenKind::Comment => {
                    let group = self.comment_group();
                    if self.peek().kind == TokenKind::Ident {
                        match self.call_stmt(Some(group)) {
                            Ok(call) => stmts.push(Stmt::Call(call)),
                            Err(error) => {
                                self.errors.push(error);
                                self.recover_stmt();
                            }
                        }
                    } else {
                        stmts.push(Stmt::Comment(group));
                    }
                }
                TokenKind::Ident => match self.call_stmt(None) {
                    Ok(call) => stmts.push(Stmt::Call(call)),
                    Err(error) => {
                        self.errors.push(error);
                        self.recover_stmt();
                    }
                },
                _ => {
                    self.errors
                        .push(self.err(ParseErrorKind::ExpectedStatement { found: self.found() }));
                    self.recover_stmt();
                }
            }
        }
    }

    /// Skips to the end of the current statement line, balancing braces.
    fn recover_stmt(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => break,
                TokenKind::RBrace if depth == 0 => break,
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline | TokenKind::Semi if depth == 0 => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn call_stmt(&mut self, doc: Option<CommentGroup>) -> Parsed<CallStmt> {
        let id = self.next_call_id;
        self.next_call_id += 1;

        let name = self.ident()?;
        let start = name.span.start;
        let mut args = Vec::new();
        loop {
            match self.peek().kind.clone() {
                TokenKind::Str(_) | TokenKind::Decimal | TokenKind::Numeric | TokenKind::Bool(_) => {
                    args.push(Expr::Lit(self.basic_lit()?));
                }
                TokenKind::Ident => args.push(Expr::Ident(self.ident()?)),
                TokenKind::TypeName(_) => args.push(Expr::Func(self.func_lit()?)),
                TokenKind::Keyword(Keyword::With)
                | TokenKind::Keyword(Keyword::As)
                | TokenKind::Semi
                | TokenKind::Newline
                | TokenKind::Comment
                | TokenKind::RBrace
                | TokenKind::Eof => break,
                _ => {
                    return Err(self.err(ParseErrorKind::ExpectedExpression { found: self.found() }))
                }
            }
        }

        let with = if self.peek().is_keyword(Keyword::With) {
            let with_start = self.advance().span.start; // with
            let expr = match self.peek().kind.clone() {
                TokenKind::Ident => Expr::Ident(self.ident()?),
                TokenKind::TypeName(_) => Expr::Func(self.func_lit()?),
                _ => {
                    return Err(self.err(ParseErrorKind::ExpectedExpression { found: self.found() }))
                }
            };
            let span = Span::new(with_start, self.prev_end());
            Some(WithClause { expr, span })
        } else {
            None
        };

        let alias = if self.peek().is_keyword(Keyword::As) {
            let as_start = self.advance().span.start; // as
            let alias_name = self.plain_ident()?;
            let span = Span::new(as_start, alias_name.span.end);
            Some(AliasDecl { name: alias_name, call: id, span })
        } else {
            None
        };

        let (terminator, end) = match self.peek().kind.clone() {
            TokenKind::Semi => {
                let tok = self.advance();
                (Some(StmtEnd::Semi(tok.span)), tok.span.end)
            }
            TokenKind::Comment => {
                let tok = self.advance();
                let comment = Comment {
                    text: tok.text.strip_prefix('#').unwrap_or(&tok.text).to_string(),
                    span: tok.span,
                };
                let end = tok.span.end;
                (Some(StmtEnd::Comment(comment)), end)
            }
            TokenKind::Newline => {
                let span = self.here();
                self.advance();
                // The newline is the terminator but not part of the
                // statement's printed extent.
                (Some(StmtEnd::Newline(span)), span.start)
            }
            TokenKind::Eof => (Some(StmtEnd::Newline(self.here())), self.here().start),
            _ => {
                return Err(
                    self.err(ParseErrorKind::ExpectedStatementEnd { found: self.found() })
                )
            }
        };

        Ok(CallStmt {
            id,
            doc,
            name,
            args,
            with,
            alias,
            terminator,
            span: Span::new(start, end),
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn func_lit(&mut self) -> Parsed<FuncLit> {
        let ty = self.type_node()?;
        let body = self.block()?;
        let span = Span::new(ty.span.start, body.span.end);
        Ok(FuncLit { ty, body, span })
    }

    fn basic_lit(&mut self) -> Parsed<BasicLit> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Str(value) => Ok(BasicLit::Str(StringLit {
                value,
                raw: tok.text,
                span: tok.span,
            })),
            TokenKind::Bool(value) => Ok(BasicLit::Bool(BoolLit { value, span: tok.span })),
            TokenKind::Decimal => {
                let value = tok.text.parse::<i64>().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::MalformedNumber { text: tok.text.clone() },
                        tok.span,
                    )
                })?;
                Ok(BasicLit::Int(IntLit {
                    value,
                    base: IntBase::Decimal,
                    raw: tok.text,
                    span: tok.span,
                }))
            }
            TokenKind::Numeric => {
                let base = match tok.text.as_bytes().get(1) {
                    Some(b'b') | Some(b'B') => IntBase::Binary,
                    Some(b'o') | Some(b'O') => IntBase::Octal,
                    _ => IntBase::Hex,
                };
                let digits = &tok.text[2..];
                let value = i64::from_str_radix(digits, base.radix()).map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::MalformedNumber { text: tok.text.clone() },
                        tok.span,
                    )
                })?;
                Ok(BasicLit::Int(IntLit { value, base, raw: tok.text, span: tok.span }))
            }
            kind => Err(ParseError::new(
                ParseErrorKind::ExpectedExpression { found: kind.describe().to_string() },
                tok.span,
            )),
        }
    }

    fn ident(&mut self) -> Parsed<Ident> {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Ident {
            return Err(self.err(ParseErrorKind::ExpectedIdent { found: self.found() }));
        }
        self.advance();
        let (name, member) = match tok.text.split_once('.') {
            Some((name, member)) => (name.to_string(), Some(member.to_string())),
            None => (tok.text.clone(), None),
        };
        Ok(Ident { name, member, span: tok.span })
    }

    /// An identifier that may not be dotted (declaration names, aliases,
    /// parameters).
    fn plain_ident(&mut self) -> Parsed<Ident> {
        let ident = self.ident()?;
        if ident.member.is_some() {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedIdent { found: format!("'{}'", ident.text()) },
                ident.span,
            ));
        }
        Ok(ident)
    }

    fn type_node(&mut self) -> Parsed<TypeNode> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::TypeName(ty) => {
                self.advance();
                Ok(TypeNode { ty, span: tok.span })
            }
            _ => Err(self.err(ParseErrorKind::ExpectedType { found: self.found() })),
        }
    }

    // ------------------------------------------------------------------
    // Trivia
    // ------------------------------------------------------------------

    /// Consumes a run of newline tokens. Returns trivia only if the run
    /// contains a blank line. A newline terminates an empty line exactly
    /// when the token before it is also a newline; structural line ends
    /// (after `{`, after a `;`-terminated statement, between
    /// declarations) are dropped. Consecutive blank lines collapse into
    /// one trivia node.
    fn newline_run(&mut self) -> Option<Newlines> {
        let start = self.here().start;
        let mut end = start;
        let mut blanks = 0;
        while self.peek().kind == TokenKind::Newline {
            let blank = self.pos > 0 && self.tokens[self.pos - 1].kind == TokenKind::Newline;
            if blank {
                blanks += 1;
            }
            end = self.peek().span.end;
            self.advance();
        }
        (blanks >= 1).then_some(Newlines { span: Span::new(start, end) })
    }

    /// Collects consecutive comment lines into one group, consuming the
    /// newline after each. On return the parser sits on the first token
    /// after the group; if that token starts a declaration or statement,
    /// the group is its doc.
    fn comment_group(&mut self) -> CommentGroup {
        let mut comments = Vec::new();
        let start = self.here().start;
        let mut end = start;
        while self.peek().kind == TokenKind::Comment {
            let tok = self.advance();
            end = tok.span.end;
            comments.push(Comment {
                text: tok.text.strip_prefix('#').unwrap_or(&tok.text).to_string(),
                span: tok.span,
            });
            if self.peek().kind == TokenKind::Newline {
                let next_is_comment =
                    matches!(self.peek_next().map(|t| &t.kind), Some(TokenKind::Comment));
                self.advance(); // newline after the comment line
                if !next_is_comment {
                    break;
                }
            } else {
                break;
            }
        }
        CommentGroup { comments, span: Span::new(start, end) }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Parsed<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.err(ParseErrorKind::ExpectedToken { expected, found: self.found() }))
        }
    }

    fn prev_end(&self) -> Position {
        if self.pos == 0 {
            self.here().start
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjType, OptionKind};

    fn parse_ok(source: &str) -> File {
        let (file, errors) = parse(source, "test.hlb");
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        file
    }

    fn only_func(file: &File) -> &FuncDecl {
        let mut funcs = file.funcs();
        let (_, func) = funcs.next().expect("no function declared");
        assert!(funcs.next().is_none(), "more than one function");
        func
    }

    #[test]
    fn parses_empty_file() {
        let file = parse_ok("");
        assert!(file.decls.is_empty());
    }

    #[test]
    fn parses_comment_only_file() {
        let file = parse_ok("# just a note\n");
        assert!(matches!(file.decls[0], Decl::Comment(_)));
    }

    #[test]
    fn parses_minimal_function() {
        let file = parse_ok("fs default() {\n\tscratch\n}\n");
        let func = only_func(&file);
        assert_eq!(func.name.name, "default");
        assert_eq!(func.ret.ty, ObjType::Fs);
        let body = func.body.as_ref().unwrap();
        let call = body.calls().next().unwrap();
        assert_eq!(call.name.name, "scratch");
        assert!(call.args.is_empty());
    }

    #[test]
    fn parses_semicolon_terminated_one_liner() {
        let file = parse_ok("fs default() { scratch; }\n");
        let func = only_func(&file);
        let call = func.body.as_ref().unwrap().calls().next().unwrap();
        assert!(matches!(call.terminator, Some(StmtEnd::Semi(_))));
    }

    #[test]
    fn parses_string_and_int_args() {
        let file = parse_ok("fs default() {\n\timage \"alpine\"\n\tmkdir \"/x\" 0o755\n}\n");
        let func = only_func(&file);
        let calls: Vec<_> = func.body.as_ref().unwrap().calls().collect();
        match &calls[0].args[0] {
            Expr::Lit(BasicLit::Str(lit)) => {
                assert_eq!(lit.value, "alpine");
                assert_eq!(lit.raw, "\"alpine\"");
            }
            other => panic!("expected string arg, got {:?}", other),
        }
        match &calls[1].args[1] {
            Expr::Lit(BasicLit::Int(lit)) => {
                assert_eq!(lit.value, 0o755);
                assert_eq!(lit.base, IntBase::Octal);
            }
            other => panic!("expected int arg, got {:?}", other),
        }
    }

    #[test]
    fn parses_params_and_variadic() {
        let file = parse_ok("fs build(string tag, variadic string flags) {\n\tscratch\n}\n");
        let func = only_func(&file);
        assert_eq!(func.params.len(), 2);
        assert!(!func.params[0].variadic);
        assert!(func.params[1].variadic);
        assert_eq!(func.params[1].ty.ty, ObjType::Str);
        assert_eq!(func.params[1].name.name, "flags");
    }

    #[test]
    fn parses_method_receiver() {
        let file = parse_ok("fs (fs) withTools() {\n\trun \"apk add build-base\"\n}\n");
        let func = only_func(&file);
        assert!(func.is_method());
        assert_eq!(func.method.unwrap().ty, ObjType::Fs);
    }

    #[test]
    fn parses_with_ident_clause() {
        let file = parse_ok("fs x() {\n\trun \"make\" with buildOpts\n}\n");
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        match &call.with.as_ref().unwrap().expr {
            Expr::Ident(ident) => assert_eq!(ident.name, "buildOpts"),
            other => panic!("expected ident with-clause, got {:?}", other),
        }
    }

    #[test]
    fn parses_inline_option_block() {
        let source = "fs x() {\n\trun \"make\" with option {\n\t\tdir \"/src\"\n\t}\n}\n";
        let file = parse_ok(source);
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        match &call.with.as_ref().unwrap().expr {
            Expr::Func(lit) => {
                assert_eq!(lit.ty.ty, ObjType::Option(None));
                assert_eq!(lit.body.calls().count(), 1);
            }
            other => panic!("expected option block, got {:?}", other),
        }
    }

    #[test]
    fn parses_alias_on_mount() {
        let source =
            "fs x() {\n\trun \"make\" with option {\n\t\tmount scratch \"/out\" as artifacts\n\t}\n}\n";
        let file = parse_ok(source);
        let run = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        let mount = match &run.with.as_ref().unwrap().expr {
            Expr::Func(lit) => lit.body.calls().next().unwrap(),
            other => panic!("expected option block, got {:?}", other),
        };
        let alias = mount.alias.as_ref().unwrap();
        assert_eq!(alias.name.name, "artifacts");
        assert_eq!(alias.call, mount.id);
    }

    #[test]
    fn parses_func_lit_argument() {
        let file = parse_ok("fs x() {\n\tcopy fs {\n\t\tlocal \".\"\n\t} \"/\" \"/app\"\n}\n");
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        assert_eq!(call.args.len(), 3);
        assert!(matches!(call.args[0], Expr::Func(_)));
        assert!(matches!(call.args[1], Expr::Lit(BasicLit::Str(_))));
    }

    #[test]
    fn parses_import_and_export() {
        let source = "import node from fs {\n\timage \"openllb/node.hlb\"\n}\n\nexport build\n";
        let file = parse_ok(source);
        match &file.decls[0] {
            Decl::Import(import) => {
                assert_eq!(import.name.name, "node");
                assert_eq!(import.from.ty.ty, ObjType::Fs);
            }
            other => panic!("expected import, got {:?}", other),
        }
        assert!(file
            .decls
            .iter()
            .any(|d| matches!(d, Decl::Export(e) if e.name.name == "build")));
    }

    #[test]
    fn parses_dotted_ident_reference() {
        let file = parse_ok("fs x() {\n\tnode.build\n}\n");
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        assert_eq!(call.name.name, "node");
        assert_eq!(call.name.member.as_deref(), Some("build"));
    }

    #[test]
    fn doc_comment_attaches_to_decl() {
        let source = "# Builds the app image.\n# Slowly.\nfs build() {\n\tscratch\n}\n";
        let file = parse_ok(source);
        let func = only_func(&file);
        let doc = func.doc.as_ref().expect("doc should attach");
        assert_eq!(doc.comments.len(), 2);
        assert_eq!(doc.comments[0].text.trim(), "Builds the app image.");
    }

    #[test]
    fn blank_line_detaches_comment_group() {
        let source = "# A stray note.\n\nfs build() {\n\tscratch\n}\n";
        let file = parse_ok(source);
        assert!(matches!(file.decls[0], Decl::Comment(_)));
        let func = only_func(&file);
        assert!(func.doc.is_none());
    }

    #[test]
    fn doc_comment_attaches_to_stmt() {
        let source = "fs build() {\n\t# pull the base\n\timage \"alpine\"\n}\n";
        let file = parse_ok(source);
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        assert!(call.doc.is_some());
    }

    #[test]
    fn trailing_comment_is_terminator() {
        let source = "fs build() {\n\tscratch # empty base\n}\n";
        let file = parse_ok(source);
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        match call.terminator.as_ref().unwrap() {
            StmtEnd::Comment(comment) => assert_eq!(comment.text.trim(), "empty base"),
            other => panic!("expected comment terminator, got {:?}", other),
        }
    }

    #[test]
    fn bad_decl_recovers_and_keeps_parsing() {
        let source = "fs broken( {\n\tscratch\n}\nfs ok() {\n\tscratch\n}\n";
        let (file, errors) = parse(source, "test.hlb");
        assert!(!errors.is_empty());
        assert!(file.decls.iter().any(|d| matches!(d, Decl::Bad(_))));
        assert!(file
            .funcs()
            .any(|(_, f)| f.name.name == "ok"), "parser should resynchronize");
    }

    #[test]
    fn multiple_errors_are_accumulated() {
        let source = "fs a( {\n}\nfs b( {\n}\n";
        let (_, errors) = parse(source, "test.hlb");
        assert!(errors.len() >= 2, "expected two errors, got {:?}", errors);
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let (_, errors) = parse("fs x() { scratch }\n", "test.hlb");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::ExpectedStatementEnd { .. })));
    }

    #[test]
    fn node_positions_are_monotonic() {
        let source = "fs build() {\n\timage \"alpine\"\n\trun \"make\" as out\n}\n";
        let file = parse_ok(source);
        let func = only_func(&file);
        assert!(func.span.start.offset <= func.span.end.offset);
        let calls: Vec<_> = func.body.as_ref().unwrap().calls().collect();
        for pair in calls.windows(2) {
            assert!(pair[0].span.end.offset <= pair[1].span.start.offset);
        }
        for call in calls {
            assert!(call.span.start.offset <= call.span.end.offset);
            for arg in &call.args {
                let span = arg.span();
                assert!(span.start.offset >= call.span.start.offset);
                assert!(span.end.offset <= call.span.end.offset);
            }
        }
    }

    #[test]
    fn call_ids_are_unique() {
        let source = "fs a() {\n\tscratch\n\trun \"x\"\n}\nfs b() {\n\tscratch\n}\n";
        let file = parse_ok(source);
        let mut ids = Vec::new();
        for (_, func) in file.funcs() {
            for call in func.body.as_ref().unwrap().calls() {
                ids.push(call.id);
            }
        }
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }

    #[test]
    fn parses_heredoc_argument() {
        let source = "fs x() {\n\trun <<~EOM\n\t\techo hi\n\tEOM\n}\n";
        let file = parse_ok(source);
        let call = only_func(&file).body.as_ref().unwrap().calls().next().unwrap();
        match &call.args[0] {
            Expr::Lit(BasicLit::Str(lit)) => assert_eq!(lit.value, "echo hi\n"),
            other => panic!("expected heredoc string, got {:?}", other),
        }
    }

    #[test]
    fn parses_option_kind_return_type() {
        let file = parse_ok("option::run buildOpts() {\n\tdir \"/src\"\n}\n");
        let func = only_func(&file);
        assert_eq!(func.ret.ty, ObjType::Option(Some(OptionKind::Run)));
    }
}
