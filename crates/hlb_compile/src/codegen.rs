//! The evaluator: walks a checked CST and emits the build-graph IR.
//!
//! Entry point is [`generate`]: look up a target function in the file
//! scope, evaluate its body, and return the resulting [`FsState`] plus
//! the [`GenInfo`] side table. Block evaluation follows the language's
//! chain protocol:
//!
//! 1. The accumulator starts at the identity for the block type (scratch
//!    for `fs`, the empty string for `string`), or at the received value
//!    for a method body.
//! 2. Debug-family statements are skipped after invoking the debug hook.
//! 3. The first effective statement is a *source*: it replaces the
//!    accumulator. Every later statement is a *chain*: it transforms it.
//! 4. A statement carrying an `as` alias binds its post-statement value
//!    in the alias table, which is how `run`'s mount subgraphs become
//!    visible to sibling functions.
//!
//! User functions evaluate their bodies with the same protocol in a
//! fresh frame binding parameters to already-evaluated arguments.
//! Imports delegate to a caller-supplied [`ImportResolver`] and address
//! exported members as `alias.member`. Evaluation is deterministic:
//! local-source ids are minted from a counter in evaluation order, and
//! nothing iterates an unordered map while emitting.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use hlb_base::Span;
use hlb_language::ast::{
    BasicLit, BlockStmt, CallStmt, Decl, Expr, Field, File, FuncDecl, Ident, Stmt, WithClause,
};
use hlb_language::builtin::{self, BuiltinSig, CallKind, ParamMode};
use hlb_language::scope::Object;
use hlb_language::types::{ObjType, OptionKind};
use log::{debug, trace};

use crate::error::{EvalError, EvalErrorKind, GenError};
use crate::ir::*;
use crate::shellquote;

/// Hook invoked before each statement of a `fs` or `string` block with
/// the current frame, the statement, and the accumulator it will see.
pub trait Debugger {
    fn on_stmt(&mut self, frame: &Frame, stmt: &CallStmt, value: &Value);
}

/// Resolves an `import` declaration to a parsed file. `source` is the
/// evaluated fs state of the import's block literal (for example the
/// image carrying the module).
pub trait ImportResolver {
    fn resolve(&mut self, alias: &str, source: &FsState) -> Result<File, String>;
}

/// Configuration for one [`generate`] call.
pub struct GenOptions {
    pub debugger: Option<Box<dyn Debugger>>,
    pub resolver: Option<Box<dyn ImportResolver>>,
    /// Evaluation aborts with `RecursionLimit` past this call depth.
    pub max_call_depth: usize,
    /// Attach `IgnoreCache` to every `generate` frontend call.
    pub ignore_generate_cache: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            debugger: None,
            resolver: None,
            max_call_depth: 512,
            ignore_generate_cache: true,
        }
    }
}

/// Side data the IR alone cannot express.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenInfo {
    /// Synthesized local-source id to the host path it stands for. The
    /// caller mounts these at build time.
    pub locals: BTreeMap<String, String>,
}

/// Parameter bindings of the function currently being evaluated.
#[derive(Debug, Clone)]
pub struct Frame {
    function: String,
    bindings: HashMap<String, Value>,
}

impl Frame {
    fn new(function: impl Into<String>) -> Self {
        Self { function: function.into(), bindings: HashMap::new() }
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    /// The name of the function this frame belongs to.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Bound parameter names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Generates the build graph for `target` in a checked `file`.
pub fn generate(file: &File, target: &str, opts: GenOptions) -> Result<(FsState, GenInfo), GenError> {
    debug!("generating target '{}' from {}", target, file.filename);
    let mut cg = CodeGen {
        debugger: opts.debugger,
        resolver: opts.resolver,
        max_depth: opts.max_call_depth,
        ignore_generate_cache: opts.ignore_generate_cache,
        locals: BTreeMap::new(),
        local_counter: 0,
        aliases: HashMap::new(),
        imports: HashMap::new(),
        depth: 0,
    };
    let state = cg.run(file, target)?;
    debug!(
        "generated target '{}': {} op(s), {} local(s)",
        target,
        state.ops.len(),
        cg.locals.len()
    );
    Ok((state, GenInfo { locals: cg.locals }))
}

struct MountAlias {
    name: String,
    mountpoint: String,
}

type AliasKey = (String, String); // (filename, alias name)

struct CodeGen {
    debugger: Option<Box<dyn Debugger>>,
    resolver: Option<Box<dyn ImportResolver>>,
    max_depth: usize,
    ignore_generate_cache: bool,
    locals: BTreeMap<String, String>,
    local_counter: usize,
    aliases: HashMap<AliasKey, Value>,
    imports: HashMap<AliasKey, Rc<File>>,
    depth: usize,
}

impl CodeGen {
    fn run(&mut self, file: &File, target: &str) -> Result<FsState, GenError> {
        let invalid = || GenError::InvalidTarget { name: target.to_string() };
        match file.scope.lookup(target) {
            Some(Object::Func { decl }) => {
                let func = decl_func(file, decl).map_err(|_| invalid())?;
                if func.is_method() || func.ret.ty != ObjType::Fs || !func.params.is_empty() {
                    return Err(invalid());
                }
                let value = self.eval_func(file, func, Vec::new(), None, func.span)?;
                as_fs(value, func.span)
            }
            Some(Object::Alias { decl, .. }) => {
                let func = decl_func(file, decl).map_err(|_| invalid())?;
                if func.is_method() || func.ret.ty != ObjType::Fs || !func.params.is_empty() {
                    return Err(invalid());
                }
                self.eval_func(file, func, Vec::new(), None, func.span)?;
                let value = self
                    .aliases
                    .get(&(file.filename.clone(), target.to_string()))
                    .cloned()
                    .ok_or_else(|| {
                        EvalError::new(
                            EvalErrorKind::AliasUnbound { name: target.to_string() },
                            func.span,
                        )
                    })?;
                as_fs(value, func.span)
            }
            _ => Err(invalid()),
        }
    }

    // ------------------------------------------------------------------
    // Functions and blocks
    // ------------------------------------------------------------------

    fn eval_func(
        &mut self,
        file: &File,
        func: &FuncDecl,
        values: Vec<Value>,
        receiver: Option<Value>,
        span: Span,
    ) -> Result<Value, GenError> {
        if self.depth >= self.max_depth {
            return Err(
                EvalError::new(EvalErrorKind::RecursionLimit { limit: self.max_depth }, span).into()
            );
        }
        let body = func.body.as_ref().ok_or_else(|| {
            internal(format!("function '{}' has no body", func.name.name), span)
        })?;
        trace!("call {}({} arg(s)) depth {}", func.name.name, values.len(), self.depth);

        let mut frame = Frame::new(func.name.name.clone());
        for (field, value) in func.params.iter().zip(values) {
            frame.bind(&field.name.name, value);
        }

        self.depth += 1;
        let result = self.eval_block(file, func.ret.ty, body, &frame, receiver);
        self.depth -= 1;
        result
    }

    fn eval_block(
        &mut self,
        file: &File,
        ty: ObjType,
        block: &BlockStmt,
        frame: &Frame,
        initial: Option<Value>,
    ) -> Result<Value, GenError> {
        match ty {
            ObjType::Fs | ObjType::Str => {}
            ObjType::Option(Some(kind)) => {
                let (items, _) = self.eval_option_block(file, kind, block, frame)?;
                return Ok(Value::Options(OptionList { kind, items }));
            }
            other => {
                return Err(internal(format!("cannot evaluate a {} block", other), block.span))
            }
        }

        let mut sourced = initial.is_some();
        let mut value = initial.unwrap_or_else(|| match ty {
            ObjType::Str => Value::Str(String::new()),
            _ => Value::Fs(FsState::scratch()),
        });

        for stmt in &block.stmts {
            let Stmt::Call(call) = stmt else { continue };

            if let Some(debugger) = self.debugger.as_mut() {
                debugger.on_stmt(frame, call, &value);
            }
            let is_debug = call.name.member.is_none()
                && builtin::lookup(ty, &call.name.name)
                    .is_some_and(|sig| sig.kind == CallKind::Debug);
            if is_debug {
                continue;
            }

            value = if sourced {
                self.eval_chain(file, ty, call, frame, value)?
            } else {
                sourced = true;
                self.eval_source(file, ty, call, frame)?
            };

            if let Some(alias) = &call.alias {
                self.aliases.insert(
                    (file.filename.clone(), alias.name.name.clone()),
                    value.clone(),
                );
            }
        }
        Ok(value)
    }

    fn eval_source(
        &mut self,
        file: &File,
        ty: ObjType,
        call: &CallStmt,
        frame: &Frame,
    ) -> Result<Value, GenError> {
        if call.name.member.is_none() {
            if let Some(sig) = builtin::lookup(ty, &call.name.name) {
                return self.eval_source_builtin(
                    file,
                    frame,
                    sig,
                    &call.args,
                    call.with.as_ref(),
                    call.span,
                );
            }
        }
        self.eval_ident(file, frame, &call.name, &call.args, None)
    }

    fn eval_chain(
        &mut self,
        file: &File,
        ty: ObjType,
        call: &CallStmt,
        frame: &Frame,
        value: Value,
    ) -> Result<Value, GenError> {
        if call.name.member.is_none() {
            if let Some(sig) = builtin::lookup(ty, &call.name.name) {
                return self.eval_chain_builtin(file, frame, sig, call, value);
            }
        }
        // Only methods survive checking in chain position.
        self.eval_ident(file, frame, &call.name, &call.args, Some(value))
    }

    /// Evaluates an identifier callee or value reference: a parameter, a
    /// user function (with `receiver` set for method calls), a bound
    /// alias, or an import member.
    fn eval_ident(
        &mut self,
        file: &File,
        frame: &Frame,
        ident: &Ident,
        args: &[Expr],
        receiver: Option<Value>,
    ) -> Result<Value, GenError> {
        if ident.member.is_some() {
            return self.eval_import_member(file, frame, ident, args);
        }
        if let Some(value) = frame.get(&ident.name) {
            return Ok(value.clone());
        }
        match file.scope.lookup(&ident.name) {
            Some(Object::Func { decl }) => {
                let func = decl_func(file, decl)?;
                let values = self.eval_call_args(file, frame, &func.params, args)?;
                self.eval_func(file, func, values, receiver, ident.span)
            }
            Some(Object::Alias { .. }) => self
                .aliases
                .get(&(file.filename.clone(), ident.name.clone()))
                .cloned()
                .ok_or_else(|| {
                    EvalError::new(
                        EvalErrorKind::AliasUnbound { name: ident.name.clone() },
                        ident.span,
                    )
                    .into()
                }),
            _ => Err(internal(format!("unresolved identifier '{}'", ident.name), ident.span)),
        }
    }

    fn eval_expr(
        &mut self,
        file: &File,
        frame: &Frame,
        expr: &Expr,
        expected: ObjType,
    ) -> Result<Value, GenError> {
        match expr {
            Expr::Lit(BasicLit::Str(lit)) => Ok(Value::Str(lit.value.clone())),
            Expr::Lit(BasicLit::Int(lit)) => {
                Ok(Value::Int(IntValue { value: lit.value, base: lit.base }))
            }
            Expr::Lit(BasicLit::Bool(lit)) => Ok(Value::Bool(lit.value)),
            Expr::Ident(ident) => {
                // Nullary source builtins double as values of their
                // receiver type: `mount scratch "/m"`.
                if ident.member.is_none() {
                    let receiver = match expected {
                        ObjType::Fs => Some(ObjType::Fs),
                        ObjType::Str => Some(ObjType::Str),
                        _ => None,
                    };
                    if let Some(receiver) = receiver {
                        if let Some(sig) = builtin::lookup(receiver, &ident.name) {
                            return self.eval_source_builtin(
                                file,
                                frame,
                                sig,
                                &[],
                                None,
                                ident.span,
                            );
                        }
                    }
                }
                self.eval_ident(file, frame, ident, &[], None)
            }
            Expr::Func(lit) => {
                // A bare option literal takes the kind expected at this
                // position.
                let ty = match (lit.ty.ty, expected) {
                    (ObjType::Option(None), ObjType::Option(Some(kind))) => {
                        ObjType::Option(Some(kind))
                    }
                    _ => lit.ty.ty,
                };
                self.eval_block(file, ty, &lit.body, frame, None)
            }
        }
    }

    /// Evaluates call arguments against a user function's parameter
    /// list. A trailing variadic parameter collects the remaining
    /// arguments into a `StrList`.
    fn eval_call_args(
        &mut self,
        file: &File,
        frame: &Frame,
        params: &[Field],
        args: &[Expr],
    ) -> Result<Vec<Value>, GenError> {
        let mut values = Vec::with_capacity(params.len());
        for (i, field) in params.iter().enumerate() {
            if field.variadic {
                let mut list = Vec::new();
                for arg in args.iter().skip(i) {
                    let value = self.eval_expr(file, frame, arg, field.ty.ty)?;
                    push_str_value(value, &mut list, arg.span())?;
                }
                values.push(Value::StrList(list));
            } else {
                let arg = args.get(i).ok_or_else(|| {
                    internal(format!("missing argument for '{}'", field.name.name), field.span)
                })?;
                values.push(self.eval_expr(file, frame, arg, field.ty.ty)?);
            }
        }
        Ok(values)
    }

    /// Evaluates call arguments against a builtin signature, returning
    /// one value per parameter. Omitted optional flags default to
    /// `true`; a variadic parameter yields a `StrList`.
    fn eval_builtin_args(
        &mut self,
        file: &File,
        frame: &Frame,
        sig: &BuiltinSig,
        args: &[Expr],
        span: Span,
    ) -> Result<Vec<Value>, GenError> {
        let mut values = Vec::with_capacity(sig.params.len());
        let mut next = 0usize;
        for param in sig.params {
            match param.mode {
                ParamMode::Required => {
                    let arg = args.get(next).ok_or_else(|| {
                        internal(format!("'{}' missing argument '{}'", sig.name, param.name), span)
                    })?;
                    next += 1;
                    values.push(self.eval_expr(file, frame, arg, param.ty)?);
                }
                ParamMode::Optional => match args.get(next) {
                    Some(arg) => {
                        next += 1;
                        values.push(self.eval_expr(file, frame, arg, param.ty)?);
                    }
                    None => values.push(Value::Bool(true)),
                },
                ParamMode::Variadic => {
                    let mut list = Vec::new();
                    for arg in args.iter().skip(next) {
                        let value = self.eval_expr(file, frame, arg, param.ty)?;
                        push_str_value(value, &mut list, arg.span())?;
                    }
                    next = args.len();
                    values.push(Value::StrList(list));
                }
            }
        }
        Ok(values)
    }

    // ------------------------------------------------------------------
    // Builtins
    // ------------------------------------------------------------------

    fn eval_source_builtin(
        &mut self,
        file: &File,
        frame: &Frame,
        sig: &BuiltinSig,
        args: &[Expr],
        with: Option<&WithClause>,
        span: Span,
    ) -> Result<Value, GenError> {
        let values = self.eval_builtin_args(file, frame, sig, args, span)?;
        let mut state = FsState::scratch();
        match sig.name {
            "scratch" => {}
            "image" => {
                let reference = as_str(&values[0], span)?;
                let (items, _) = self.eval_with(file, frame, with, sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Image(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Image { reference, options });
            }
            "http" => {
                let url = as_str(&values[0], span)?;
                let (items, _) = self.eval_with(file, frame, with, sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Http(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Http { url, options });
            }
            "git" => {
                let remote = as_str(&values[0], span)?;
                let reference = as_str(&values[1], span)?;
                let (items, _) = self.eval_with(file, frame, with, sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Git(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Git { remote, reference, options });
            }
            "local" => {
                let path = as_str(&values[0], span)?;
                let id = format!("local-{}", self.local_counter);
                self.local_counter += 1;
                self.locals.insert(id.clone(), path);
                let (items, _) = self.eval_with(file, frame, with, sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Local(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Local { id, options });
            }
            "generate" => {
                let source = as_fs(values.into_iter().next().expect("arity"), span)?;
                let (items, _) = self.eval_with(file, frame, with, sig)?;
                let mut options = collect_options(items, span, |i| match i {
                    OptItem::Frontend(o) => Some(o),
                    _ => None,
                })?;
                if self.ignore_generate_cache {
                    options.push(FrontendOption::IgnoreCache);
                }
                state.push(FsOp::Frontend { source: Box::new(source), options });
            }
            "value" => return Ok(Value::Str(as_str(&values[0], span)?)),
            "format" => return self.eval_format(span, values),
            other => return Err(internal(format!("unhandled source builtin '{}'", other), span)),
        }
        Ok(Value::Fs(state))
    }

    fn eval_chain_builtin(
        &mut self,
        file: &File,
        frame: &Frame,
        sig: &BuiltinSig,
        call: &CallStmt,
        value: Value,
    ) -> Result<Value, GenError> {
        let span = call.span;
        let mut state = as_fs(value, span)?;
        let values = self.eval_builtin_args(file, frame, sig, &call.args, call.span)?;
        match sig.name {
            "run" => {
                let words = as_str_list(&values[0], span)?;
                let command = match words.len() {
                    0 => String::new(),
                    1 => words[0].clone(),
                    _ => shellquote::join(words.iter().map(|s| s.as_str())),
                };
                let (items, mounts) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Run(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Run { command, options });
                // Aliased mounts see the filesystem after the exec ran.
                for mount in mounts {
                    let output = FsState {
                        ops: vec![FsOp::MountOutput {
                            exec: Box::new(state.clone()),
                            mountpoint: mount.mountpoint,
                        }],
                    };
                    self.aliases
                        .insert((file.filename.clone(), mount.name), Value::Fs(output));
                }
            }
            "env" => {
                let key = as_str(&values[0], span)?;
                let value = as_str(&values[1], span)?;
                state.push(FsOp::Env { key, value });
            }
            "dir" => state.push(FsOp::Dir { path: as_str(&values[0], span)? }),
            "user" => state.push(FsOp::User { name: as_str(&values[0], span)? }),
            "entrypoint" => {
                state.push(FsOp::Entrypoint { args: as_str_list(&values[0], span)?.clone() })
            }
            "mkdir" => {
                let path = as_str(&values[0], span)?;
                let mode = file_mode(&values[1], arg_span(call, 1))?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Mkdir(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Mkdir { path, mode, options });
            }
            "mkfile" => {
                let path = as_str(&values[0], span)?;
                let mode = file_mode(&values[1], arg_span(call, 1))?;
                let content = as_str(&values[2], span)?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Mkfile(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Mkfile { path, mode, content, options });
            }
            "rm" => {
                let path = as_str(&values[0], span)?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Rm(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Rm { path, options });
            }
            "copy" => {
                let mut iter = values.into_iter();
                let input = as_fs(iter.next().expect("arity"), span)?;
                let src = as_str(&iter.next().expect("arity"), span)?;
                let dest = as_str(&iter.next().expect("arity"), span)?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Copy(o) => Some(o),
                    _ => None,
                })?;
                state.push(FsOp::Copy { input: Box::new(input), src, dest, options });
            }
            other => return Err(internal(format!("unhandled chain builtin '{}'", other), span)),
        }
        Ok(Value::Fs(state))
    }

    fn eval_format(&mut self, span: Span, values: Vec<Value>) -> Result<Value, GenError> {
        let fmt = as_str(&values[0], span)?;
        let list = as_str_list(&values[1], span)?;

        let mut out = String::new();
        let mut expected = 0usize;
        let mut chars = fmt.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some('s') => {
                    if let Some(value) = list.get(expected) {
                        out.push_str(value);
                    }
                    expected += 1;
                }
                Some('d') => {
                    if let Some(value) = list.get(expected) {
                        if value.parse::<i64>().is_err() {
                            return Err(EvalError::new(
                                EvalErrorKind::FormatBadInt { value: value.clone() },
                                span,
                            )
                            .into());
                        }
                        out.push_str(value);
                    }
                    expected += 1;
                }
                other => {
                    return Err(EvalError::new(
                        EvalErrorKind::FormatBadDirective {
                            directive: other.map(String::from).unwrap_or_default(),
                        },
                        span,
                    )
                    .into())
                }
            }
        }
        if expected != list.len() {
            return Err(EvalError::new(
                EvalErrorKind::FormatArgumentCount { expected, found: list.len() },
                span,
            )
            .into());
        }
        Ok(Value::Str(out))
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    fn eval_with(
        &mut self,
        file: &File,
        frame: &Frame,
        with: Option<&WithClause>,
        sig: &BuiltinSig,
    ) -> Result<(Vec<OptItem>, Vec<MountAlias>), GenError> {
        let Some(with) = with else {
            return Ok((Vec::new(), Vec::new()));
        };
        let kind = sig.option.ok_or_else(|| {
            internal(format!("'{}' does not take options", sig.name), with.span)
        })?;
        match &with.expr {
            // Only an inline block can deliver aliased mounts.
            Expr::Func(lit) => self.eval_option_block(file, kind, &lit.body, frame),
            expr => {
                let value = self.eval_expr(file, frame, expr, ObjType::Option(Some(kind)))?;
                match value {
                    Value::Options(list) => Ok((list.items, Vec::new())),
                    other => Err(internal(
                        format!("with clause evaluated to {}", other.kind_name()),
                        with.span,
                    )),
                }
            }
        }
    }

    fn eval_option_block(
        &mut self,
        file: &File,
        kind: OptionKind,
        block: &BlockStmt,
        frame: &Frame,
    ) -> Result<(Vec<OptItem>, Vec<MountAlias>), GenError> {
        let receiver = ObjType::Option(Some(kind));
        let mut items = Vec::new();
        let mut mounts = Vec::new();
        for call in block.calls() {
            let sig = builtin::lookup(receiver, &call.name.name).ok_or_else(|| {
                internal(format!("no builtin '{}' in {} block", call.name.name, receiver), call.span)
            })?;
            let values = self.eval_builtin_args(file, frame, sig, &call.args, call.span)?;
            let Some(item) = self.make_option_item(file, frame, kind, sig, call, values)? else {
                continue;
            };
            if let Some(alias) = &call.alias {
                if let OptItem::Run(RunOption::Mount { mountpoint, .. }) = &item {
                    mounts.push(MountAlias {
                        name: alias.name.name.clone(),
                        mountpoint: mountpoint.clone(),
                    });
                }
            }
            items.push(item);
        }
        Ok((items, mounts))
    }

    /// Builds one option item from an evaluated option statement.
    /// Returns `None` when a flag builtin was passed `false`, which
    /// elides the item entirely.
    fn make_option_item(
        &mut self,
        file: &File,
        frame: &Frame,
        kind: OptionKind,
        sig: &BuiltinSig,
        call: &CallStmt,
        values: Vec<Value>,
    ) -> Result<Option<OptItem>, GenError> {
        use OptionKind as K;
        let span = call.span;
        let item = match (kind, sig.name) {
            (K::Image, "resolve") => flag(&values, span)?.then_some(OptItem::Image(ImageOption::Resolve)),
            (K::Http, "checksum") => {
                Some(OptItem::Http(HttpOption::Checksum(as_str(&values[0], span)?)))
            }
            (K::Http, "chmod") => {
                Some(OptItem::Http(HttpOption::Chmod(file_mode(&values[0], arg_span(call, 0))?)))
            }
            (K::Http, "filename") => {
                Some(OptItem::Http(HttpOption::Filename(as_str(&values[0], span)?)))
            }
            (K::Git, "keepGitDir") => flag(&values, span)?.then_some(OptItem::Git(GitOption::KeepGitDir)),
            (K::Local, "includePatterns") => Some(OptItem::Local(LocalOption::IncludePatterns(
                as_str_list(&values[0], span)?.clone(),
            ))),
            (K::Local, "excludePatterns") => Some(OptItem::Local(LocalOption::ExcludePatterns(
                as_str_list(&values[0], span)?.clone(),
            ))),
            (K::Local, "followPaths") => Some(OptItem::Local(LocalOption::FollowPaths(
                as_str_list(&values[0], span)?.clone(),
            ))),
            (K::Generate, "frontendInput") => {
                let key = as_str(&values[0], span)?;
                let mut iter = values.into_iter();
                iter.next();
                let value = as_fs(iter.next().expect("arity"), span)?;
                Some(OptItem::Frontend(FrontendOption::Input { key, value }))
            }
            (K::Generate, "frontendOpt") => Some(OptItem::Frontend(FrontendOption::Opt {
                key: as_str(&values[0], span)?,
                value: as_str(&values[1], span)?,
            })),
            (K::Run, "readonlyRootfs") => {
                flag(&values, span)?.then_some(OptItem::Run(RunOption::ReadonlyRootfs))
            }
            (K::Run, "env") => Some(OptItem::Run(RunOption::Env {
                key: as_str(&values[0], span)?,
                value: as_str(&values[1], span)?,
            })),
            (K::Run, "dir") => {
                Some(OptItem::Run(RunOption::Dir { path: as_str(&values[0], span)? }))
            }
            (K::Run, "user") => {
                Some(OptItem::Run(RunOption::User { name: as_str(&values[0], span)? }))
            }
            (K::Run, "network") => {
                let value = as_str(&values[0], span)?;
                let mode = NetworkMode::parse(&value).ok_or_else(|| {
                    EvalError::new(EvalErrorKind::UnknownNetworkMode { value }, arg_span(call, 0))
                })?;
                Some(OptItem::Run(RunOption::Network(mode)))
            }
            (K::Run, "security") => {
                let value = as_str(&values[0], span)?;
                let mode = SecurityMode::parse(&value).ok_or_else(|| {
                    EvalError::new(EvalErrorKind::UnknownSecurityMode { value }, arg_span(call, 0))
                })?;
                Some(OptItem::Run(RunOption::Security(mode)))
            }
            (K::Run, "host") => Some(OptItem::Run(RunOption::Host {
                name: as_str(&values[0], span)?,
                address: as_str(&values[1], span)?,
            })),
            (K::Run, "ssh") => {
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Ssh(o) => Some(o),
                    _ => None,
                })?;
                Some(OptItem::Run(RunOption::Ssh { options }))
            }
            (K::Run, "secret") => {
                let mountpoint = as_str(&values[0], span)?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Secret(o) => Some(o),
                    _ => None,
                })?;
                Some(OptItem::Run(RunOption::Secret { mountpoint, options }))
            }
            (K::Run, "mount") => {
                let mut iter = values.into_iter();
                let input = as_fs(iter.next().expect("arity"), span)?;
                let mountpoint = as_str(&iter.next().expect("arity"), span)?;
                let (items, _) = self.eval_with(file, frame, call.with.as_ref(), sig)?;
                let options = collect_options(items, span, |i| match i {
                    OptItem::Mount(o) => Some(o),
                    _ => None,
                })?;
                Some(OptItem::Run(RunOption::Mount { input, mountpoint, options }))
            }
            (K::Ssh, "target") => {
                Some(OptItem::Ssh(SshOption::Target(as_str(&values[0], span)?)))
            }
            (K::Ssh, "uid") => {
                Some(OptItem::Ssh(SshOption::Uid(id_value(&values[0], arg_span(call, 0))?)))
            }
            (K::Ssh, "gid") => {
                Some(OptItem::Ssh(SshOption::Gid(id_value(&values[0], arg_span(call, 0))?)))
            }
            (K::Ssh, "mode") => {
                Some(OptItem::Ssh(SshOption::Mode(file_mode(&values[0], arg_span(call, 0))?)))
            }
            (K::Secret, "uid") => {
                Some(OptItem::Secret(SecretOption::Uid(id_value(&values[0], arg_span(call, 0))?)))
            }
            (K::Secret, "gid") => {
                Some(OptItem::Secret(SecretOption::Gid(id_value(&values[0], arg_span(call, 0))?)))
            }
            (K::Secret, "mode") => Some(OptItem::Secret(SecretOption::Mode(file_mode(
                &values[0],
                arg_span(call, 0),
            )?))),
            (K::Mount, "readonly") => {
                flag(&values, span)?.then_some(OptItem::Mount(MountOption::Readonly))
            }
            (K::Mount, "tmpfs") => flag(&values, span)?.then_some(OptItem::Mount(MountOption::Tmpfs)),
            (K::Mount, "sourcePath") => {
                Some(OptItem::Mount(MountOption::SourcePath(as_str(&values[0], span)?)))
            }
            (K::Mount, "cache") => {
                let id = as_str(&values[0], span)?;
                let value = as_str(&values[1], span)?;
                let sharing = CacheSharing::parse(&value).ok_or_else(|| {
                    EvalError::new(EvalErrorKind::UnknownCacheSharing { value }, arg_span(call, 1))
                })?;
                Some(OptItem::Mount(MountOption::Cache { id, sharing }))
            }
            (K::Mkdir, "createParents") => {
                flag(&values, span)?.then_some(OptItem::Mkdir(MkdirOption::CreateParents))
            }
            (K::Mkdir, "chown") => {
                Some(OptItem::Mkdir(MkdirOption::Chown(as_str(&values[0], span)?)))
            }
            (K::Mkdir, "createdTime") => Some(OptItem::Mkdir(MkdirOption::CreatedTime(
                created_time(&values[0], arg_span(call, 0))?,
            ))),
            (K::Mkfile, "chown") => {
                Some(OptItem::Mkfile(MkfileOption::Chown(as_str(&values[0], span)?)))
            }
            (K::Mkfile, "createdTime") => Some(OptItem::Mkfile(MkfileOption::CreatedTime(
                created_time(&values[0], arg_span(call, 0))?,
            ))),
            (K::Rm, "allowNotFound") => {
                flag(&values, span)?.then_some(OptItem::Rm(RmOption::AllowNotFound))
            }
            (K::Rm, "allowWildcard") => {
                flag(&values, span)?.then_some(OptItem::Rm(RmOption::AllowWildcard))
            }
            (K::Copy, "followSymlinks") => {
                flag(&values, span)?.then_some(OptItem::Copy(CopyOption::FollowSymlinks))
            }
            (K::Copy, "contentsOnly") => {
                flag(&values, span)?.then_some(OptItem::Copy(CopyOption::ContentsOnly))
            }
            (K::Copy, "unpack") => flag(&values, span)?.then_some(OptItem::Copy(CopyOption::Unpack)),
            (K::Copy, "createDestPath") => {
                flag(&values, span)?.then_some(OptItem::Copy(CopyOption::CreateDestPath))
            }
            (kind, name) => {
                return Err(internal(format!("unhandled option::{} builtin '{}'", kind, name), span))
            }
        };
        Ok(item)
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn eval_import_member(
        &mut self,
        file: &File,
        frame: &Frame,
        ident: &Ident,
        args: &[Expr],
    ) -> Result<Value, GenError> {
        let alias = ident.name.clone();
        let member = ident.member.clone().ok_or_else(|| {
            internal("import member reference without member".to_string(), ident.span)
        })?;

        let key = (file.filename.clone(), alias.clone());
        let imported = match self.imports.get(&key).cloned() {
            Some(rc) => rc,
            None => {
                let rc = self.resolve_import(file, &alias, ident.span)?;
                self.imports.insert(key, rc.clone());
                rc
            }
        };

        if !imported.scope.is_exported(&member) {
            return Err(EvalError::new(
                EvalErrorKind::NotExported { alias, name: member },
                ident.span,
            )
            .into());
        }
        let func = match imported.scope.lookup(&member) {
            Some(Object::Func { decl }) => decl_func(&imported, decl)?,
            _ => {
                return Err(EvalError::new(
                    EvalErrorKind::NotExported { alias, name: member },
                    ident.span,
                )
                .into())
            }
        };
        if func.is_method() {
            return Err(EvalError::new(
                EvalErrorKind::WrongType {
                    name: member,
                    expected: "a function".to_string(),
                    found: "a method".to_string(),
                },
                ident.span,
            )
            .into());
        }

        // The import's signature was invisible to the checker; validate
        // the call here instead.
        let positional = func.params.iter().filter(|f| !f.variadic).count();
        let variadic = func.params.iter().any(|f| f.variadic);
        if args.len() < positional || (!variadic && args.len() > positional) {
            return Err(EvalError::new(
                EvalErrorKind::WrongArity {
                    name: member,
                    expected: positional,
                    found: args.len(),
                },
                ident.span,
            )
            .into());
        }
        let values = self.eval_call_args(file, frame, &func.params, args)?;
        for (field, value) in func.params.iter().zip(&values) {
            if !field.variadic && !value_matches(value, field.ty.ty) {
                return Err(EvalError::new(
                    EvalErrorKind::WrongType {
                        name: field.name.name.clone(),
                        expected: field.ty.ty.to_string(),
                        found: value.kind_name().to_string(),
                    },
                    ident.span,
                )
                .into());
            }
        }

        self.eval_func(&imported, func, values, None, ident.span)
    }

    fn resolve_import(
        &mut self,
        file: &File,
        alias: &str,
        span: Span,
    ) -> Result<Rc<File>, GenError> {
        let Some(Object::Import { decl }) = file.scope.lookup(alias) else {
            return Err(internal(format!("'{}' is not an import", alias), span));
        };
        let Some(Decl::Import(import)) = file.decls.get(decl) else {
            return Err(internal(format!("import '{}' lost its declaration", alias), span));
        };

        let src_frame = Frame::new(format!("import {}", alias));
        let source = self.eval_block(file, ObjType::Fs, &import.from.body, &src_frame, None)?;
        let state = as_fs(source, import.span)?;

        let resolver = self.resolver.as_mut().ok_or_else(|| GenError::Import {
            alias: alias.to_string(),
            reason: "no import resolver configured".to_string(),
            span: import.span,
        })?;
        let mut resolved = resolver.resolve(alias, &state).map_err(|reason| GenError::Import {
            alias: alias.to_string(),
            reason,
            span: import.span,
        })?;

        let diagnostics = hlb_language::check(&mut resolved);
        if let Some(first) = diagnostics.first() {
            return Err(GenError::Import {
                alias: alias.to_string(),
                reason: format!("{} diagnostic(s), first: {}", diagnostics.len(), first),
                span: import.span,
            });
        }
        debug!("resolved import '{}' to {}", alias, resolved.filename);
        Ok(Rc::new(resolved))
    }
}

// ----------------------------------------------------------------------
// Value plumbing
// ----------------------------------------------------------------------

fn internal(message: String, span: Span) -> GenError {
    EvalError::new(EvalErrorKind::Internal { message }, span).into()
}

fn decl_func(file: &File, index: usize) -> Result<&FuncDecl, GenError> {
    match file.decls.get(index) {
        Some(Decl::Func(func)) => Ok(func),
        _ => Err(internal(format!("declaration {} is not a function", index), Span::default())),
    }
}

fn arg_span(call: &CallStmt, index: usize) -> Span {
    call.args.get(index).map(|a| a.span()).unwrap_or(call.span)
}

fn as_str(value: &Value, span: Span) -> Result<String, GenError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(internal(format!("expected string, found {}", other.kind_name()), span)),
    }
}

fn as_fs(value: Value, span: Span) -> Result<FsState, GenError> {
    match value {
        Value::Fs(state) => Ok(state),
        other => Err(internal(format!("expected fs, found {}", other.kind_name()), span)),
    }
}

fn as_str_list(value: &Value, span: Span) -> Result<&Vec<String>, GenError> {
    match value {
        Value::StrList(list) => Ok(list),
        other => Err(internal(
            format!("expected variadic strings, found {}", other.kind_name()),
            span,
        )),
    }
}

fn push_str_value(value: Value, list: &mut Vec<String>, span: Span) -> Result<(), GenError> {
    match value {
        Value::Str(s) => list.push(s),
        Value::Int(i) => list.push(i.value.to_string()),
        Value::StrList(mut nested) => list.append(&mut nested),
        other => {
            return Err(internal(
                format!("expected string, found {}", other.kind_name()),
                span,
            ))
        }
    }
    Ok(())
}

/// The value of a flag builtin's optional bool, defaulted to `true`.
fn flag(values: &[Value], span: Span) -> Result<bool, GenError> {
    match values.first() {
        Some(Value::Bool(b)) => Ok(*b),
        None => Ok(true),
        Some(other) => Err(internal(format!("expected bool, found {}", other.kind_name()), span)),
    }
}

fn file_mode(value: &Value, span: Span) -> Result<u32, GenError> {
    let int = match value {
        Value::Int(i) => i.value,
        other => {
            return Err(internal(format!("expected int, found {}", other.kind_name()), span))
        }
    };
    if (0..=0o7777).contains(&int) {
        Ok(int as u32)
    } else {
        Err(EvalError::new(EvalErrorKind::BadFileMode { value: int }, span).into())
    }
}

fn id_value(value: &Value, span: Span) -> Result<u32, GenError> {
    let int = match value {
        Value::Int(i) => i.value,
        other => {
            return Err(internal(format!("expected int, found {}", other.kind_name()), span))
        }
    };
    u32::try_from(int).map_err(|_| EvalError::new(EvalErrorKind::BadId { value: int }, span).into())
}

fn created_time(value: &Value, span: Span) -> Result<String, GenError> {
    let text = as_str(value, span)?;
    chrono::DateTime::parse_from_rfc3339(&text)
        .map_err(|_| EvalError::new(EvalErrorKind::BadTimestamp { value: text.clone() }, span))?;
    Ok(text)
}

fn value_matches(value: &Value, ty: ObjType) -> bool {
    match (value, ty) {
        (Value::Fs(_), ObjType::Fs)
        | (Value::Str(_), ObjType::Str)
        | (Value::Int(_), ObjType::Int)
        | (Value::Bool(_), ObjType::Bool) => true,
        (Value::Options(list), ObjType::Option(kind)) => kind.map_or(true, |k| list.kind == k),
        (Value::StrList(_), ObjType::Str) => true,
        _ => false,
    }
}

fn collect_options<T>(
    items: Vec<OptItem>,
    span: Span,
    select: impl Fn(OptItem) -> Option<T>,
) -> Result<Vec<T>, GenError> {
    items
        .into_iter()
        .map(|item| {
            select(item).ok_or_else(|| internal("mismatched option kind in list".to_string(), span))
        })
        .collect()
}
