//! Concrete syntax tree for HLB programs.
//!
//! One tagged enum per syntactic category (`Decl`, `Stmt`, `Expr`,
//! `BasicLit`) with a struct per node. Every node stores the [`Span`] it
//! was parsed from; `span()` on the enums dispatches to it. Trivia
//! (comments, blank lines) is part of the tree so the formatter can
//! preserve it, and doc comment groups are attached to the node they
//! document during parsing.
//!
//! The tree is immutable after checking; the checker only fills the file
//! scope side table. Cross-references (an `as` alias back to its call
//! statement, scope objects back to declarations) are stored as plain
//! indices rather than pointers: declarations by position in
//! `File::decls`, call statements by their parser-assigned [`CallId`].

use hlb_base::Span;
use serde::{Deserialize, Serialize};

use crate::scope::FileScope;
use crate::types::ObjType;

/// File-unique identifier of a call statement, assigned by the parser in
/// source order.
pub type CallId = u32;

#[derive(Debug, Clone, Default)]
pub struct File {
    pub filename: String,
    pub decls: Vec<Decl>,
    /// Populated by the checker; empty until then.
    pub scope: FileScope,
}

impl File {
    /// Iterates the function declarations in source order with their
    /// declaration indices.
    pub fn funcs(&self) -> impl Iterator<Item = (usize, &FuncDecl)> {
        self.decls.iter().enumerate().filter_map(|(i, d)| match d {
            Decl::Func(func) => Some((i, func)),
            _ => None,
        })
    }

    pub fn span(&self) -> Span {
        let mut span = Span::default();
        for decl in &self.decls {
            span = if span.is_empty() { decl.span() } else { span.merge(decl.span()) };
        }
        span
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Bad(BadDecl),
    Import(ImportDecl),
    Export(ExportDecl),
    Func(FuncDecl),
    /// A blank line (run of consecutive newlines) kept as trivia.
    Newline(Newlines),
    /// A comment group not attached to any declaration.
    Comment(CommentGroup),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Bad(d) => d.span,
            Decl::Import(d) => d.span,
            Decl::Export(d) => d.span,
            Decl::Func(d) => d.span,
            Decl::Newline(d) => d.span,
            Decl::Comment(d) => d.span,
        }
    }
}

/// An unparseable declaration. The parser records the skipped source and
/// resynchronizes at the next declaration.
#[derive(Debug, Clone)]
pub struct BadDecl {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Newlines {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Comment {
    /// Text after the leading `#`, verbatim.
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CommentGroup {
    pub comments: Vec<Comment>,
    pub span: Span,
}

/// `import <alias> from fs { ... }`
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub doc: Option<CommentGroup>,
    pub name: Ident,
    pub from: FuncLit,
    pub span: Span,
}

/// `export <name>`
#[derive(Debug, Clone)]
pub struct ExportDecl {
    pub doc: Option<CommentGroup>,
    pub name: Ident,
    pub span: Span,
}

/// `<type> [(<receiver>)] <name>(<fields>) { ... }`
///
/// A declaration with a receiver is a method: it can only be called in
/// chain position of a block of the receiver's type, and its body chains
/// onto the received value instead of starting from the identity.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub doc: Option<CommentGroup>,
    pub ret: TypeNode,
    pub method: Option<TypeNode>,
    pub name: Ident,
    pub params: Vec<Field>,
    pub body: Option<BlockStmt>,
    pub span: Span,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.method.is_some()
    }
}

/// A parameter: `[variadic] <type> <name>`.
#[derive(Debug, Clone)]
pub struct Field {
    pub variadic: bool,
    pub ty: TypeNode,
    pub name: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeNode {
    pub ty: ObjType,
    pub span: Span,
}

/// An identifier reference. `member` is set for the dotted
/// `alias.member` form reserved for import member access.
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub member: Option<String>,
    pub span: Span,
}

impl Ident {
    /// The identifier as written, including a dotted member.
    pub fn text(&self) -> String {
        match &self.member {
            Some(member) => format!("{}.{}", self.name, member),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockStmt {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl BlockStmt {
    /// Iterates the call statements, skipping trivia.
    pub fn calls(&self) -> impl Iterator<Item = &CallStmt> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Call(call) => Some(call),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Call(CallStmt),
    Newline(Newlines),
    Comment(CommentGroup),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Call(s) => s.span,
            Stmt::Newline(s) => s.span,
            Stmt::Comment(s) => s.span,
        }
    }
}

/// `<name> <args>... [with <opts>] [as <alias>] <end>`
#[derive(Debug, Clone)]
pub struct CallStmt {
    pub id: CallId,
    pub doc: Option<CommentGroup>,
    pub name: Ident,
    pub args: Vec<Expr>,
    pub with: Option<WithClause>,
    pub alias: Option<AliasDecl>,
    pub terminator: Option<StmtEnd>,
    pub span: Span,
}

/// What ended a call statement. A trailing comment doubles as the
/// statement's terminator and is reprinted after it.
#[derive(Debug, Clone)]
pub enum StmtEnd {
    Semi(Span),
    Newline(Span),
    Comment(Comment),
}

/// `with <ident>` or `with option { ... }`
#[derive(Debug, Clone)]
pub struct WithClause {
    pub expr: Expr,
    pub span: Span,
}

/// `as <name>`, binding the statement's intermediate value.
///
/// `call` is the id of the owning [`CallStmt`]; the enclosing function is
/// recorded in the file scope when the checker binds the alias.
#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: Ident,
    pub call: CallId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(Ident),
    Lit(BasicLit),
    Func(FuncLit),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(i) => i.span,
            Expr::Lit(l) => l.span(),
            Expr::Func(f) => f.span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum BasicLit {
    Str(StringLit),
    Int(IntLit),
    Bool(BoolLit),
}

impl BasicLit {
    pub fn span(&self) -> Span {
        match self {
            BasicLit::Str(l) => l.span,
            BasicLit::Int(l) => l.span,
            BasicLit::Bool(l) => l.span,
        }
    }

    pub fn ty(&self) -> ObjType {
        match self {
            BasicLit::Str(_) => ObjType::Str,
            BasicLit::Int(_) => ObjType::Int,
            BasicLit::Bool(_) => ObjType::Bool,
        }
    }
}

/// String literal with its decoded value and the raw source text (quoted
/// form or whole heredoc) for faithful reprinting.
#[derive(Debug, Clone)]
pub struct StringLit {
    pub value: String,
    pub raw: String,
    pub span: Span,
}

/// Radix of an integer literal as written. Values compare numerically;
/// the base only matters for formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntBase {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl IntBase {
    pub fn radix(self) -> u32 {
        match self {
            IntBase::Binary => 2,
            IntBase::Octal => 8,
            IntBase::Decimal => 10,
            IntBase::Hex => 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntLit {
    pub value: i64,
    pub base: IntBase,
    pub raw: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BoolLit {
    pub value: bool,
    pub span: Span,
}

/// A typed block literal: `fs { ... }`, `option { ... }`, ...
///
/// Acts as a typed thunk: it evaluates to a value of its declared type
/// when the evaluator reaches it.
#[derive(Debug, Clone)]
pub struct FuncLit {
    pub ty: TypeNode,
    pub body: BlockStmt,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlb_base::Position;

    fn span(start: usize, end: usize) -> Span {
        Span::new(
            Position::new(start, 1, start as u32 + 1),
            Position::new(end, 1, end as u32 + 1),
        )
    }

    #[test]
    fn ident_text_includes_member() {
        let plain = Ident { name: "build".into(), member: None, span: span(0, 5) };
        let dotted = Ident {
            name: "node".into(),
            member: Some("build".into()),
            span: span(0, 10),
        };
        assert_eq!(plain.text(), "build");
        assert_eq!(dotted.text(), "node.build");
    }

    #[test]
    fn basic_lit_types() {
        let s = BasicLit::Str(StringLit {
            value: "x".into(),
            raw: "\"x\"".into(),
            span: span(0, 3),
        });
        let i = BasicLit::Int(IntLit {
            value: 493,
            base: IntBase::Octal,
            raw: "0o755".into(),
            span: span(0, 5),
        });
        let b = BasicLit::Bool(BoolLit { value: true, span: span(0, 4) });
        assert_eq!(s.ty(), ObjType::Str);
        assert_eq!(i.ty(), ObjType::Int);
        assert_eq!(b.ty(), ObjType::Bool);
    }

    #[test]
    fn int_base_radix() {
        assert_eq!(IntBase::Binary.radix(), 2);
        assert_eq!(IntBase::Octal.radix(), 8);
        assert_eq!(IntBase::Decimal.radix(), 10);
        assert_eq!(IntBase::Hex.radix(), 16);
    }

    #[test]
    fn file_span_covers_decls() {
        let file = File {
            filename: "test.hlb".into(),
            decls: vec![
                Decl::Export(ExportDecl {
                    doc: None,
                    name: Ident { name: "a".into(), member: None, span: span(7, 8) },
                    span: span(0, 8),
                }),
                Decl::Newline(Newlines { span: span(8, 10) }),
            ],
            scope: Default::default(),
        };
        assert_eq!(file.span().start.offset, 0);
        assert_eq!(file.span().end.offset, 10);
    }
}
