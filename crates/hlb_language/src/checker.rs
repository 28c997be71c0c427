//! Name binding and type checking for parsed HLB files.
//!
//! Two passes over the tree:
//!
//! 1. **Collect**: populates the file scope with every top-level
//!    function, import alias, and `as` alias declared anywhere in a
//!    function body (aliases bind at file level so sibling functions can
//!    reference them). Duplicates and exports of undeclared names are
//!    reported here.
//! 2. **Resolve**: validates every function body against its declared
//!    block type: callee resolution, source-vs-chain position, argument
//!    arity and types, `with` option kinds, option-block contents, and
//!    alias placement. Block literals recurse with the type expected at
//!    their position, which is how a bare `option { ... }` inherits its
//!    kind from the builtin it configures.
//!
//! All diagnostics are accumulated; checking never stops at the first
//! error. On return the file's scope table is filled in, which is the
//! only mutation checking performs.

use log::debug;

use crate::ast::*;
use crate::builtin::{self, BuiltinSig, CallKind, ParamMode};
use crate::error::{CheckError, CheckErrorKind};
use crate::scope::{FileScope, Object, ParamBinding, Resolved, Scope};
use crate::types::{ObjType, OptionKind};

/// Checks `file`, filling its scope table and returning every diagnostic
/// found. An empty result means the file is well-typed.
pub fn check(file: &mut File) -> Vec<CheckError> {
    let mut errors = Vec::new();
    let scope = collect(file, &mut errors);

    {
        let checker = Checker { file: &*file, scope: &scope };
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => checker.check_func(func, &mut errors),
                Decl::Import(import) => checker.check_import(import, &mut errors),
                _ => {}
            }
        }
    }

    debug!(
        "checked {}: {} diagnostic(s)",
        file.filename,
        errors.len()
    );
    file.scope = scope;
    errors
}

// ----------------------------------------------------------------------
// Pass 1: collect
// ----------------------------------------------------------------------

fn collect(file: &File, errors: &mut Vec<CheckError>) -> FileScope {
    let mut scope = FileScope::default();

    for (index, decl) in file.decls.iter().enumerate() {
        match decl {
            Decl::Func(func) => {
                if scope.insert(&func.name.name, Object::Func { decl: index }).is_some() {
                    errors.push(CheckError::new(
                        CheckErrorKind::DuplicateDeclaration { name: func.name.name.clone() },
                        func.name.span,
                    ));
                }
            }
            Decl::Import(import) => {
                if scope
                    .insert(&import.name.name, Object::Import { decl: index })
                    .is_some()
                {
                    errors.push(CheckError::new(
                        CheckErrorKind::DuplicateDeclaration { name: import.name.name.clone() },
                        import.name.span,
                    ));
                }
            }
            _ => {}
        }
    }

    for (index, decl) in file.decls.iter().enumerate() {
        if let Decl::Func(func) = decl {
            if let Some(body) = &func.body {
                collect_aliases(body, index, &mut scope, errors);
            }
        }
    }

    for decl in &file.decls {
        if let Decl::Export(export) = decl {
            if scope.contains(&export.name.name) {
                scope.add_export(&export.name.name);
            } else {
                errors.push(CheckError::new(
                    CheckErrorKind::UndefinedExport { name: export.name.name.clone() },
                    export.name.span,
                ));
            }
        }
    }

    scope
}

fn collect_aliases(
    block: &BlockStmt,
    decl: usize,
    scope: &mut FileScope,
    errors: &mut Vec<CheckError>,
) {
    for call in block.calls() {
        if let Some(alias) = &call.alias {
            if scope
                .insert(&alias.name.name, Object::Alias { decl, call: alias.call })
                .is_some()
            {
                errors.push(CheckError::new(
                    CheckErrorKind::DuplicateDeclaration { name: alias.name.name.clone() },
                    alias.name.span,
                ));
            }
        }
        for arg in &call.args {
            if let Expr::Func(lit) = arg {
                collect_aliases(&lit.body, decl, scope, errors);
            }
        }
        if let Some(with) = &call.with {
            if let Expr::Func(lit) = &with.expr {
                collect_aliases(&lit.body, decl, scope, errors);
            }
        }
    }
}

// ----------------------------------------------------------------------
// Pass 2: resolve and type check
// ----------------------------------------------------------------------

/// Context flags threaded through nested block checks.
#[derive(Debug, Clone, Copy, Default)]
struct Ctx {
    /// Checking an inline `with option { ... }` block, where `mount`
    /// statements may carry an alias.
    inline_with: bool,
    /// Checking the body of a named `option::<kind>` function, where
    /// aliases are rejected (a referenced options value cannot deliver
    /// its mount subgraphs to the caller).
    named_option: bool,
    /// Checking a method body, which chains onto the received value, so
    /// no source statement is expected or allowed.
    method_body: bool,
}

/// How a call statement's callee participates in its block.
enum Callee<'a> {
    Builtin(&'static BuiltinSig),
    User { decl: &'a FuncDecl },
    Method { decl: &'a FuncDecl },
    Param(ParamBinding),
    Alias,
    /// `alias.member`: the signature lives in an unresolved file, so
    /// argument checking is deferred to evaluation.
    ImportMember,
}

/// The builtin receiver to consult when an identifier is used as a value
/// of `expected` type. Option values only come from scope bindings.
fn value_receiver(expected: ObjType) -> Option<ObjType> {
    match expected {
        ObjType::Fs => Some(ObjType::Fs),
        ObjType::Str => Some(ObjType::Str),
        _ => None,
    }
}

struct Checker<'a> {
    file: &'a File,
    scope: &'a FileScope,
}

impl<'a> Checker<'a> {
    fn func_decl(&self, index: usize) -> Option<&'a FuncDecl> {
        match self.file.decls.get(index) {
            Some(Decl::Func(func)) => Some(func),
            _ => None,
        }
    }

    fn check_func(&self, func: &FuncDecl, errors: &mut Vec<CheckError>) {
        if func.ret.ty == ObjType::Option(None) {
            errors.push(CheckError::new(
                CheckErrorKind::BareOptionReturnType { name: func.name.name.clone() },
                func.ret.span,
            ));
        }
        if let Some(receiver) = &func.method {
            if !receiver.ty.compatible(func.ret.ty) {
                errors.push(CheckError::new(
                    CheckErrorKind::MethodReceiverMismatch {
                        name: func.name.name.clone(),
                        receiver: receiver.ty,
                        ret: func.ret.ty,
                    },
                    receiver.span,
                ));
            }
        }

        let mut scope = Scope::new(self.scope);
        for field in &func.params {
            // Variadic parameters collect string arguments, matching the
            // builtin surface; other element types have no spread form.
            if field.variadic && field.ty.ty != ObjType::Str {
                errors.push(CheckError::new(
                    CheckErrorKind::TypeMismatch { expected: ObjType::Str, found: field.ty.ty },
                    field.ty.span,
                ));
            }
            if field.ty.ty == ObjType::Option(None) {
                errors.push(CheckError::new(
                    CheckErrorKind::BareOptionReturnType { name: field.name.name.clone() },
                    field.ty.span,
                ));
            }
            if !scope.bind_param(
                &field.name.name,
                ParamBinding { ty: field.ty.ty, variadic: field.variadic },
            ) {
                errors.push(CheckError::new(
                    CheckErrorKind::DuplicateDeclaration { name: field.name.name.clone() },
                    field.name.span,
                ));
            }
        }

        if let Some(body) = &func.body {
            let ctx = Ctx {
                named_option: func.ret.ty.is_option(),
                method_body: func.is_method(),
                ..Default::default()
            };
            self.check_block(func.ret.ty, body, &scope, ctx, errors);
        }
    }

    fn check_import(&self, import: &ImportDecl, errors: &mut Vec<CheckError>) {
        if import.from.ty.ty != ObjType::Fs {
            errors.push(CheckError::new(
                CheckErrorKind::ImportSourceNotFs { found: import.from.ty.ty },
                import.from.ty.span,
            ));
            return;
        }
        let scope = Scope::new(self.scope);
        self.check_block(ObjType::Fs, &import.from.body, &scope, Ctx::default(), errors);
    }

    fn check_block(
        &self,
        ty: ObjType,
        block: &BlockStmt,
        scope: &Scope<'_>,
        ctx: Ctx,
        errors: &mut Vec<CheckError>,
    ) {
        match ty {
            ObjType::Fs | ObjType::Str => self.check_chain_block(ty, block, scope, ctx, errors),
            ObjType::Option(Some(kind)) => {
                self.check_option_block(kind, block, scope, ctx, errors)
            }
            // A bare option block only appears where the kind could not
            // be inferred; the kind error was already reported at the
            // declaration that lost it.
            ObjType::Option(None) => {}
            // int/bool blocks cannot be written: no literal or return
            // type produces one.
            ObjType::Int | ObjType::Bool => {}
        }
    }

    fn check_chain_block(
        &self,
        ty: ObjType,
        block: &BlockStmt,
        scope: &Scope<'_>,
        ctx: Ctx,
        errors: &mut Vec<CheckError>,
    ) {
        let mut effective = usize::from(ctx.method_body);
        for call in block.calls() {
            let callee = match self.resolve_callee(ty, call, scope) {
                Ok(callee) => callee,
                Err(error) => {
                    errors.push(error);
                    continue;
                }
            };

            let is_debug = matches!(&callee, Callee::Builtin(sig) if sig.kind == CallKind::Debug);
            if !is_debug {
                let chains = match &callee {
                    Callee::Builtin(sig) => sig.kind == CallKind::Chain,
                    Callee::Method { .. } => true,
                    _ => false,
                };
                if ty == ObjType::Str && effective > 0 {
                    errors.push(CheckError::new(CheckErrorKind::StringBlockChained, call.span));
                } else if chains && effective == 0 {
                    errors.push(CheckError::new(
                        CheckErrorKind::ChainInSourcePosition { name: call.name.text() },
                        call.name.span,
                    ));
                } else if !chains && effective > 0 {
                    errors.push(CheckError::new(
                        CheckErrorKind::SourceInChainPosition { name: call.name.text() },
                        call.name.span,
                    ));
                }
                effective += 1;
            }

            self.check_call(call, &callee, scope, errors);

            if call.alias.is_some() && ty != ObjType::Fs {
                errors.push(CheckError::new(
                    CheckErrorKind::AliasNotAllowedHere,
                    call.alias.as_ref().map(|a| a.span).unwrap_or(call.span),
                ));
            }
        }
    }

    fn check_option_block(
        &self,
        kind: OptionKind,
        block: &BlockStmt,
        scope: &Scope<'_>,
        ctx: Ctx,
        errors: &mut Vec<CheckError>,
    ) {
        let receiver = ObjType::Option(Some(kind));
        for call in block.calls() {
            let Some(sig) = builtin::lookup(receiver, &call.name.name) else {
                errors.push(CheckError::new(
                    CheckErrorKind::UnknownBuiltin { block: receiver, name: call.name.text() },
                    call.name.span,
                ));
                continue;
            };
            self.check_call(call, &Callee::Builtin(sig), scope, errors);

            if let Some(alias) = &call.alias {
                let allowed = ctx.inline_with && !ctx.named_option && sig.name == "mount";
                if !allowed {
                    errors.push(CheckError::new(CheckErrorKind::AliasNotAllowedHere, alias.span));
                }
            }
        }
    }

    fn resolve_callee(
        &self,
        ty: ObjType,
        call: &CallStmt,
        scope: &Scope<'_>,
    ) -> Result<Callee<'a>, CheckError> {
        let name = &call.name;
        if name.member.is_some() {
            return match scope.resolve(&name.name) {
                Some(Resolved::Object(Object::Import { .. })) => Ok(Callee::ImportMember),
                Some(_) => Err(CheckError::new(
                    CheckErrorKind::NotAnImport { name: name.name.clone() },
                    name.span,
                )),
                None => Err(CheckError::new(
                    CheckErrorKind::UndefinedIdent { name: name.name.clone() },
                    name.span,
                )),
            };
        }

        if let Some(sig) = builtin::lookup(ty, &name.name) {
            return Ok(Callee::Builtin(sig));
        }

        match scope.resolve(&name.name) {
            Some(Resolved::Param(binding)) => {
                if !binding.ty.compatible(ty) || binding.variadic {
                    return Err(CheckError::new(
                        CheckErrorKind::NotCallableInBlock { name: name.name.clone(), block: ty },
                        name.span,
                    ));
                }
                Ok(Callee::Param(binding))
            }
            Some(Resolved::Object(Object::Func { decl })) => {
                let func = self.func_decl(decl).ok_or_else(|| {
                    CheckError::new(
                        CheckErrorKind::UndefinedIdent { name: name.name.clone() },
                        name.span,
                    )
                })?;
                if !func.ret.ty.compatible(ty) {
                    return Err(CheckError::new(
                        CheckErrorKind::NotCallableInBlock { name: name.name.clone(), block: ty },
                        name.span,
                    ));
                }
                if func.is_method() {
                    Ok(Callee::Method { decl: func })
                } else {
                    Ok(Callee::User { decl: func })
                }
            }
            Some(Resolved::Object(Object::Alias { .. })) => {
                if ty != ObjType::Fs {
                    return Err(CheckError::new(
                        CheckErrorKind::NotCallableInBlock { name: name.name.clone(), block: ty },
                        name.span,
                    ));
                }
                Ok(Callee::Alias)
            }
            Some(Resolved::Object(Object::Import { .. })) => Err(CheckError::new(
                CheckErrorKind::ImportMemberElsewhere { name: name.name.clone() },
                name.span,
            )),
            None => Err(CheckError::new(
                CheckErrorKind::UndefinedIdent { name: name.name.clone() },
                name.span,
            )),
        }
    }

    /// Arity, argument types, and the with clause for one call.
    fn check_call(
        &self,
        call: &CallStmt,
        callee: &Callee<'a>,
        scope: &Scope<'_>,
        errors: &mut Vec<CheckError>,
    ) {
        let params: Vec<(ObjType, ParamMode)> = match callee {
            Callee::Builtin(sig) => sig.params.iter().map(|p| (p.ty, p.mode)).collect(),
            Callee::User { decl } | Callee::Method { decl } => decl
                .params
                .iter()
                .map(|f| {
                    let mode = if f.variadic { ParamMode::Variadic } else { ParamMode::Required };
                    (f.ty.ty, mode)
                })
                .collect(),
            Callee::Param(_) | Callee::Alias => Vec::new(),
            Callee::ImportMember => {
                // Signature unknown until the import resolves; still make
                // sure argument expressions are themselves well-formed.
                for arg in &call.args {
                    self.check_expr_shallow(arg, scope, errors);
                }
                self.check_with(call, None, scope, errors);
                return;
            }
        };

        self.check_arity(call, &params, errors);

        let variadic_ty = params
            .iter()
            .find(|(_, mode)| *mode == ParamMode::Variadic)
            .map(|(ty, _)| *ty);
        let positional: Vec<ObjType> = params
            .iter()
            .filter(|(_, mode)| *mode != ParamMode::Variadic)
            .map(|(ty, _)| *ty)
            .collect();

        // `format` interpolates both strings and ints through %s/%d.
        let lenient_variadic =
            matches!(callee, Callee::Builtin(sig) if sig.receiver == ObjType::Str && sig.name == "format");

        for (i, arg) in call.args.iter().enumerate() {
            match positional.get(i) {
                Some(expected) => {
                    self.check_expr(arg, *expected, false, scope, errors);
                }
                None => match variadic_ty {
                    Some(expected) => {
                        if lenient_variadic {
                            self.check_format_value(arg, scope, errors);
                        } else {
                            self.check_expr(arg, expected, true, scope, errors);
                        }
                    }
                    // Arity error already reported.
                    None => break,
                },
            }
        }

        let option = match callee {
            Callee::Builtin(sig) => sig.option,
            _ => None,
        };
        self.check_with(call, option, scope, errors);
    }

    fn check_arity(
        &self,
        call: &CallStmt,
        params: &[(ObjType, ParamMode)],
        errors: &mut Vec<CheckError>,
    ) {
        let required = params.iter().filter(|(_, m)| *m == ParamMode::Required).count();
        let variadic = params.iter().any(|(_, m)| *m == ParamMode::Variadic);
        let max = if variadic { usize::MAX } else { params.len() };
        let found = call.args.len();
        if found >= required && found <= max {
            return;
        }
        let expected = if variadic {
            format!("at least {}", required)
        } else if params.len() > required {
            format!("{} to {}", required, params.len())
        } else {
            required.to_string()
        };
        errors.push(CheckError::new(
            CheckErrorKind::ArityMismatch { name: call.name.text(), expected, found },
            call.span,
        ));
    }

    fn check_expr(
        &self,
        expr: &Expr,
        expected: ObjType,
        variadic_slot: bool,
        scope: &Scope<'_>,
        errors: &mut Vec<CheckError>,
    ) {
        match expr {
            Expr::Lit(lit) => {
                if !lit.ty().compatible(expected) {
                    errors.push(CheckError::new(
                        CheckErrorKind::TypeMismatch { expected, found: lit.ty() },
                        lit.span(),
                    ));
                }
            }
            Expr::Ident(ident) => {
                // Nullary source builtins are usable as values of their
                // receiver type: `mount scratch "/m"`, `copy scratch ...`.
                if ident.member.is_none() {
                    if let Some(receiver) = value_receiver(expected) {
                        if let Some(sig) = builtin::lookup(receiver, &ident.name) {
                            if sig.kind != CallKind::Source {
                                errors.push(CheckError::new(
                                    CheckErrorKind::NotCallableInBlock {
                                        name: ident.name.clone(),
                                        block: receiver,
                                    },
                                    ident.span,
                                ));
                            } else if sig.arity().0 > 0 {
                                errors.push(CheckError::new(
                                    CheckErrorKind::ArityMismatch {
                                        name: ident.name.clone(),
                                        expected: sig.arity().0.to_string(),
                                        found: 0,
                                    },
                                    ident.span,
                                ));
                            }
                            return;
                        }
                    }
                }
                let Some(found) = self.ident_type(ident, scope, variadic_slot, errors) else {
                    return;
                };
                if let Some(found) = found {
                    if !found.compatible(expected) {
                        errors.push(CheckError::new(
                            CheckErrorKind::TypeMismatch { expected, found },
                            ident.span,
                        ));
                    }
                }
            }
            Expr::Func(lit) => {
                if !lit.ty.ty.compatible(expected) {
                    errors.push(CheckError::new(
                        CheckErrorKind::TypeMismatch { expected, found: lit.ty.ty },
                        lit.ty.span,
                    ));
                    return;
                }
                // A bare option literal inherits the kind expected here.
                let effective = match (lit.ty.ty, expected) {
                    (ObjType::Option(None), ObjType::Option(Some(kind))) => {
                        ObjType::Option(Some(kind))
                    }
                    _ => lit.ty.ty,
                };
                self.check_block(effective, &lit.body, scope, Ctx::default(), errors);
            }
        }
    }

    /// Checks an expression whose expected type is unknown (arguments to
    /// import members): identifiers must resolve, literals are fine, and
    /// block literals check against their own declared type.
    fn check_expr_shallow(&self, expr: &Expr, scope: &Scope<'_>, errors: &mut Vec<CheckError>) {
        match expr {
            Expr::Lit(_) => {}
            Expr::Ident(ident) => {
                let _ = self.ident_type(ident, scope, false, errors);
            }
            Expr::Func(lit) => {
                self.check_block(lit.ty.ty, &lit.body, scope, Ctx::default(), errors)
            }
        }
    }

    /// A `format` value may be a string or an int.
    fn check_format_value(&self, expr: &Expr, scope: &Scope<'_>, errors: &mut Vec<CheckError>) {
        let found = match expr {
            Expr::Lit(lit) => Some(lit.ty()),
            Expr::Ident(ident) => match self.ident_type(ident, scope, true, errors) {
                Some(ty) => ty,
                None => return,
            },
            Expr::Func(lit) => Some(lit.ty.ty),
        };
        if let Some(found) = found {
            if !(found.compatible(ObjType::Str) || found.compatible(ObjType::Int)) {
                errors.push(CheckError::new(
                    CheckErrorKind::TypeMismatch { expected: ObjType::Str, found },
                    expr.span(),
                ));
            }
        }
    }

    /// Resolves an identifier used as a value. Returns `None` if an error
    /// was reported, `Some(None)` if the type is unknowable (import
    /// member), and `Some(Some(ty))` otherwise.
    fn ident_type(
        &self,
        ident: &Ident,
        scope: &Scope<'_>,
        variadic_slot: bool,
        errors: &mut Vec<CheckError>,
    ) -> Option<Option<ObjType>> {
        if ident.member.is_some() {
            return match scope.resolve(&ident.name) {
                Some(Resolved::Object(Object::Import { .. })) => Some(None),
                Some(_) => {
                    errors.push(CheckError::new(
                        CheckErrorKind::NotAnImport { name: ident.name.clone() },
                        ident.span,
                    ));
                    None
                }
                None => {
                    errors.push(CheckError::new(
                        CheckErrorKind::UndefinedIdent { name: ident.name.clone() },
                        ident.span,
                    ));
                    None
                }
            };
        }
        match scope.resolve(&ident.name) {
            Some(Resolved::Param(binding)) => {
                if binding.variadic && !variadic_slot {
                    errors.push(CheckError::new(
                        CheckErrorKind::VariadicRefOutsideVariadic { name: ident.name.clone() },
                        ident.span,
                    ));
                    return None;
                }
                Some(Some(binding.ty))
            }
            Some(Resolved::Object(Object::Func { decl })) => {
                let func = self.func_decl(decl)?;
                if func.is_method() {
                    errors.push(CheckError::new(
                        CheckErrorKind::NotCallableInBlock {
                            name: ident.name.clone(),
                            block: func.ret.ty,
                        },
                        ident.span,
                    ));
                    return None;
                }
                let required = func.params.iter().filter(|f| !f.variadic).count();
                if required > 0 {
                    errors.push(CheckError::new(
                        CheckErrorKind::ArityMismatch {
                            name: ident.name.clone(),
                            expected: required.to_string(),
                            found: 0,
                        },
                        ident.span,
                    ));
                }
                Some(Some(func.ret.ty))
            }
            Some(Resolved::Object(Object::Alias { .. })) => Some(Some(ObjType::Fs)),
            Some(Resolved::Object(Object::Import { .. })) => {
                errors.push(CheckError::new(
                    CheckErrorKind::ImportMemberElsewhere { name: ident.name.clone() },
                    ident.span,
                ));
                None
            }
            None => {
                errors.push(CheckError::new(
                    CheckErrorKind::UndefinedIdent { name: ident.name.clone() },
                    ident.span,
                ));
                None
            }
        }
    }

    fn check_with(
        &self,
        call: &CallStmt,
        option: Option<OptionKind>,
        scope: &Scope<'_>,
        errors: &mut Vec<CheckError>,
    ) {
        let Some(with) = &call.with else { return };
        let Some(kind) = option else {
            errors.push(CheckError::new(
                CheckErrorKind::WithNotAccepted { name: call.name.text() },
                with.span,
            ));
            return;
        };

        match &with.expr {
            Expr::Ident(ident) => {
                let Some(found) = self.ident_type(ident, scope, false, errors) else {
                    return;
                };
                if let Some(found) = found {
                    if found != ObjType::Option(Some(kind)) {
                        errors.push(CheckError::new(
                            CheckErrorKind::WithKindMismatch {
                                name: call.name.text(),
                                expected: kind,
                                found,
                            },
                            ident.span,
                        ));
                    }
                }
            }
            Expr::Func(lit) => {
                let ok = matches!(lit.ty.ty, ObjType::Option(None))
                    || lit.ty.ty == ObjType::Option(Some(kind));
                if !ok {
                    errors.push(CheckError::new(
                        CheckErrorKind::WithKindMismatch {
                            name: call.name.text(),
                            expected: kind,
                            found: lit.ty.ty,
                        },
                        lit.ty.span,
                    ));
                    return;
                }
                let ctx = Ctx { inline_with: true, ..Default::default() };
                self.check_block(ObjType::Option(Some(kind)), &lit.body, scope, ctx, errors);
            }
            Expr::Lit(lit) => {
                errors.push(CheckError::new(
                    CheckErrorKind::WithKindMismatch {
                        name: call.name.text(),
                        expected: kind,
                        found: lit.ty(),
                    },
                    lit.span(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check_source(source: &str) -> (File, Vec<CheckError>) {
        let (mut file, parse_errors) = parse(source, "test.hlb");
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        let errors = check(&mut file);
        (file, errors)
    }

    fn assert_clean(source: &str) -> File {
        let (file, errors) = check_source(source);
        assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);
        file
    }

    fn single_error(source: &str) -> CheckError {
        let (_, mut errors) = check_source(source);
        assert_eq!(errors.len(), 1, "expected one diagnostic, got {:?}", errors);
        errors.pop().unwrap()
    }

    #[test]
    fn accepts_minimal_program() {
        let file = assert_clean("fs default() {\n\tscratch\n}\n");
        assert!(matches!(
            file.scope.lookup("default"),
            Some(Object::Func { decl: 0 })
        ));
    }

    #[test]
    fn accepts_chained_program() {
        assert_clean(
            "fs default() {\n\timage \"alpine\"\n\trun \"echo hi\"\n\tenv \"K\" \"V\"\n}\n",
        );
    }

    #[test]
    fn rejects_duplicate_function_names() {
        let err = single_error("fs a() { scratch; }\nfs a() { scratch; }\n");
        assert!(matches!(err.kind, CheckErrorKind::DuplicateDeclaration { .. }));
    }

    #[test]
    fn rejects_undefined_ident() {
        let err = single_error("fs a() {\n\tmissing\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::UndefinedIdent { ref name } if name == "missing"));
    }

    #[test]
    fn rejects_export_of_undeclared_name() {
        let err = single_error("export ghost\n");
        assert!(matches!(err.kind, CheckErrorKind::UndefinedExport { .. }));
    }

    #[test]
    fn export_of_declared_name_is_recorded() {
        let file = assert_clean("fs build() { scratch; }\nexport build\n");
        assert!(file.scope.is_exported("build"));
    }

    #[test]
    fn rejects_chain_builtin_in_source_position() {
        let err = single_error("fs a() {\n\trun \"make\"\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::ChainInSourcePosition { .. }));
    }

    #[test]
    fn rejects_source_builtin_in_chain_position() {
        let err = single_error("fs a() {\n\tscratch\n\timage \"alpine\"\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::SourceInChainPosition { .. }));
    }

    #[test]
    fn rejects_unknown_builtin_argument_arity() {
        let err = single_error("fs a() {\n\timage \"one\" \"two\"\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::ArityMismatch { ref found, .. } if *found == 2));
    }

    #[test]
    fn variadic_builtin_accepts_zero_args() {
        assert_clean("fs a() {\n\timage \"alpine\"\n\tentrypoint\n}\n");
    }

    #[test]
    fn rejects_argument_type_mismatch() {
        let err = single_error("fs a() {\n\tmkdir \"/x\" \"rwx\"\n}\n");
        assert!(matches!(
            err.kind,
            CheckErrorKind::TypeMismatch { expected: ObjType::Int, found: ObjType::Str }
        ));
    }

    #[test]
    fn accepts_user_function_call_with_args() {
        assert_clean(
            "fs base(string tag) {\n\timage tag\n}\nfs a() {\n\tbase \"alpine\"\n}\n",
        );
    }

    #[test]
    fn rejects_wrong_with_kind() {
        let source = "option::copy co() { followSymlinks; }\nfs a() {\n\timage \"x\" with co\n}\n";
        let err = single_error(source);
        assert!(matches!(
            err.kind,
            CheckErrorKind::WithKindMismatch { expected: OptionKind::Image, .. }
        ));
    }

    #[test]
    fn accepts_named_with_options() {
        assert_clean(
            "option::run opts() { dir \"/src\"; readonlyRootfs; }\nfs a() {\n\timage \"x\"\n\trun \"make\" with opts\n}\n",
        );
    }

    #[test]
    fn accepts_inline_option_block_with_inferred_kind() {
        assert_clean(
            "fs a() {\n\timage \"x\"\n\trun \"make\" with option {\n\t\tdir \"/src\"\n\t\tmount scratch \"/out\"\n\t}\n}\n",
        );
    }

    #[test]
    fn rejects_with_on_plain_chain_builtin() {
        let err = single_error("fs a() {\n\timage \"x\"\n\tenv \"K\" \"V\" with option {}\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::WithNotAccepted { .. }));
    }

    #[test]
    fn rejects_option_builtin_from_wrong_kind() {
        let err = single_error(
            "fs a() {\n\timage \"x\" with option {\n\t\tdir \"/src\"\n\t}\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::UnknownBuiltin { .. }));
    }

    #[test]
    fn rejects_second_statement_in_string_block() {
        let err = single_error(
            "string s() {\n\tvalue \"a\"\n\tvalue \"b\"\n}\nfs a() {\n\timage s\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::StringBlockChained));
    }

    #[test]
    fn accepts_mount_alias_in_inline_with_block() {
        assert_clean(
            "fs a() {\n\timage \"x\"\n\trun \"make\" with option {\n\t\tmount scratch \"/out\" as out\n\t}\n}\nfs b() {\n\ta\n\tcopy out \"/out/bin\" \"/bin\"\n}\n",
        );
    }

    #[test]
    fn rejects_mount_alias_in_named_option_function() {
        let source =
            "option::run opts() {\n\tmount scratch \"/out\" as out\n}\nfs a() {\n\timage \"x\"\n\trun \"make\" with opts\n}\n";
        let err = single_error(source);
        assert!(matches!(err.kind, CheckErrorKind::AliasNotAllowedHere));
    }

    #[test]
    fn rejects_alias_in_string_block() {
        let err = single_error("string s() {\n\tvalue \"a\" as v\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::AliasNotAllowedHere));
    }

    #[test]
    fn method_body_chains_from_the_receiver() {
        assert_clean(
            "fs (fs) tools() {\n\trun \"apk add build-base\"\n}\nfs a() {\n\timage \"alpine\"\n\ttools\n}\n",
        );
    }

    #[test]
    fn rejects_method_in_source_position() {
        let err = single_error(
            "fs (fs) tools() {\n\trun \"apk\"\n}\nfs a() {\n\ttools\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::ChainInSourcePosition { .. }));
    }

    #[test]
    fn rejects_plain_function_in_chain_position() {
        let err = single_error(
            "fs base() {\n\tscratch\n}\nfs a() {\n\timage \"x\"\n\tbase\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::SourceInChainPosition { .. }));
    }

    #[test]
    fn rejects_method_receiver_return_mismatch() {
        let (_, errors) = check_source("string (fs) s() {\n\tvalue \"x\"\n}\n");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, CheckErrorKind::MethodReceiverMismatch { .. })));
    }

    #[test]
    fn rejects_bare_option_return_type() {
        let err = single_error("option opts() {}\n");
        assert!(matches!(err.kind, CheckErrorKind::BareOptionReturnType { .. }));
    }

    #[test]
    fn format_accepts_string_and_int_values() {
        assert_clean("string s() {\n\tformat \"%s-%d\" \"v\" 42\n}\n");
    }

    #[test]
    fn variadic_param_spreads_into_variadic_slot() {
        assert_clean("fs a(variadic string cmd) {\n\timage \"x\"\n\trun cmd\n}\n");
    }

    #[test]
    fn variadic_param_cannot_fill_positional_slot() {
        let err = single_error("fs a(variadic string tags) {\n\timage tags\n}\n");
        assert!(matches!(err.kind, CheckErrorKind::VariadicRefOutsideVariadic { .. }));
    }

    #[test]
    fn rejects_import_member_on_non_import() {
        let err = single_error(
            "fs base() { scratch; }\nfs a() {\n\tbase.thing\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::NotAnImport { .. }));
    }

    #[test]
    fn accepts_import_and_member_reference() {
        assert_clean(
            "import node from fs {\n\timage \"openllb/node.hlb\"\n}\nfs a() {\n\tnode.build\n}\n",
        );
    }

    #[test]
    fn rejects_import_alias_used_without_member() {
        let err = single_error(
            "import node from fs {\n\timage \"n\"\n}\nfs a() {\n\tnode\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::ImportMemberElsewhere { .. }));
    }

    #[test]
    fn nested_block_literals_check_three_deep() {
        assert_clean(
            "fs a() {\n\timage \"x\"\n\tcopy fs {\n\t\timage \"y\"\n\t\tcopy fs {\n\t\t\tscratch\n\t\t} \"/a\" \"/b\"\n\t} \"/c\" \"/d\"\n}\n",
        );
    }

    #[test]
    fn duplicate_alias_and_function_name_collide() {
        let err = single_error(
            "fs out() { scratch; }\nfs a() {\n\timage \"x\"\n\trun \"m\" with option {\n\t\tmount scratch \"/o\" as out\n\t}\n}\n",
        );
        assert!(matches!(err.kind, CheckErrorKind::DuplicateDeclaration { .. }));
    }

    #[test]
    fn scope_binds_alias_to_call_id() {
        let file = assert_clean(
            "fs a() {\n\timage \"x\"\n\trun \"m\" with option {\n\t\tmount scratch \"/o\" as out\n\t}\n}\n",
        );
        match file.scope.lookup("out") {
            Some(Object::Alias { decl, .. }) => assert_eq!(decl, 0),
            other => panic!("expected alias binding, got {:?}", other),
        }
    }
}
