//! Canonical source formatting for the CST.
//!
//! Every node prints back to normalized HLB source: declarations separated
//! by one blank line, one statement per line indented with tabs, `with
//! <ident>` clauses inline, option blocks indented, comments and blank
//! lines preserved in place, and semicolon terminators normalized to
//! newlines. Literals reprint their raw text, so escapes, heredocs, and
//! integer bases survive untouched.
//!
//! Formatting is idempotent after one pass: parsing formatted output and
//! formatting again reproduces it byte for byte.

use std::fmt;

use crate::ast::*;

/// Formats a parsed file back to canonical source.
pub fn format_file(file: &File) -> String {
    let mut printer = Printer { out: String::new() };
    printer.file(file);
    printer.out
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_file(self))
    }
}

struct Printer {
    out: String,
}

impl Printer {
    fn file(&mut self, file: &File) {
        let mut first = true;
        for decl in &file.decls {
            match decl {
                // Top-level blank lines are normalized to the single
                // separator emitted between declarations.
                Decl::Newline(_) => continue,
                _ => {}
            }
            if !first {
                self.out.push('\n');
            }
            first = false;
            self.decl(decl);
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Bad(bad) => {
                self.out.push_str(bad.text.trim_end());
                self.out.push('\n');
            }
            Decl::Import(import) => {
                self.doc(import.doc.as_ref(), 0);
                self.out.push_str("import ");
                self.out.push_str(&import.name.name);
                self.out.push_str(" from ");
                self.func_lit(&import.from, 0);
                self.out.push('\n');
            }
            Decl::Export(export) => {
                self.doc(export.doc.as_ref(), 0);
                self.out.push_str("export ");
                self.out.push_str(&export.name.name);
                self.out.push('\n');
            }
            Decl::Func(func) => {
                self.doc(func.doc.as_ref(), 0);
                self.func_decl(func);
                self.out.push('\n');
            }
            Decl::Newline(_) => {}
            Decl::Comment(group) => self.comments(group, 0),
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        self.out.push_str(&func.ret.ty.to_string());
        self.out.push(' ');
        if let Some(receiver) = &func.method {
            self.out.push('(');
            self.out.push_str(&receiver.ty.to_string());
            self.out.push_str(") ");
        }
        self.out.push_str(&func.name.name);
        self.out.push('(');
        for (i, field) in func.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if field.variadic {
                self.out.push_str("variadic ");
            }
            self.out.push_str(&field.ty.ty.to_string());
            self.out.push(' ');
            self.out.push_str(&field.name.name);
        }
        self.out.push(')');
        if let Some(body) = &func.body {
            self.out.push(' ');
            self.block(body, 0);
        }
    }

    fn block(&mut self, block: &BlockStmt, indent: usize) {
        if block.stmts.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        for stmt in &block.stmts {
            match stmt {
                Stmt::Call(call) => {
                    self.doc(call.doc.as_ref(), indent + 1);
                    self.indent(indent + 1);
                    self.call(call, indent + 1);
                    if let Some(StmtEnd::Comment(comment)) = &call.terminator {
                        self.out.push_str(" #");
                        self.out.push_str(&comment.text);
                    }
                    self.out.push('\n');
                }
                Stmt::Newline(_) => self.out.push('\n'),
                Stmt::Comment(group) => self.comments(group, indent + 1),
            }
        }
        self.indent(indent);
        self.out.push('}');
    }

    fn call(&mut self, call: &CallStmt, indent: usize) {
        self.out.push_str(&call.name.text());
        for arg in &call.args {
            self.out.push(' ');
            self.expr(arg, indent);
        }
        if let Some(with) = &call.with {
            self.out.push_str(" with ");
            self.expr(&with.expr, indent);
        }
        if let Some(alias) = &call.alias {
            self.out.push_str(" as ");
            self.out.push_str(&alias.name.name);
        }
    }

    fn expr(&mut self, expr: &Expr, indent: usize) {
        match expr {
            Expr::Ident(ident) => self.out.push_str(&ident.text()),
            Expr::Lit(lit) => self.lit(lit),
            Expr::Func(lit) => self.func_lit(lit, indent),
        }
    }

    fn lit(&mut self, lit: &BasicLit) {
        match lit {
            BasicLit::Str(s) => self.out.push_str(&s.raw),
            BasicLit::Int(i) => self.out.push_str(&i.raw),
            BasicLit::Bool(b) => self.out.push_str(if b.value { "true" } else { "false" }),
        }
    }

    fn func_lit(&mut self, lit: &FuncLit, indent: usize) {
        self.out.push_str(&lit.ty.ty.to_string());
        self.out.push(' ');
        self.block(&lit.body, indent);
    }

    fn doc(&mut self, doc: Option<&CommentGroup>, indent: usize) {
        if let Some(group) = doc {
            self.comments(group, indent);
        }
    }

    fn comments(&mut self, group: &CommentGroup, indent: usize) {
        for comment in &group.comments {
            self.indent(indent);
            self.out.push('#');
            self.out.push_str(&comment.text);
            self.out.push('\n');
        }
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push('\t');
        }
    }
}
