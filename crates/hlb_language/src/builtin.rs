//! The builtin registry: one static table describing every built-in
//! callable's signature, shared by the type checker and the evaluator.
//!
//! Each entry is keyed by `(receiver, name)`. The receiver is the block
//! type the builtin appears in: `fs` and `string` builtins are split into
//! *source* operations (establish the block's value) and *chain*
//! operations (transform it); `option::<kind>` builtins contribute items
//! to an option list. `option` is the required with-clause kind for
//! builtins that accept one.
//!
//! Keeping this data-driven, rather than spread over matches in the
//! checker and evaluator, means the two can never disagree about a
//! signature.

use crate::types::{ObjType, OptionKind};

/// How a builtin participates in block evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Establishes the block's value; must be the first effective
    /// statement.
    Source,
    /// Transforms the accumulated value; must follow a source.
    Chain,
    /// Contributes items inside an `option::<kind>` block.
    Option,
    /// Debugger hook; skipped by evaluation, legal in any position.
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Required,
    /// May be omitted; flag booleans default to `true`.
    Optional,
    /// Zero or more trailing arguments.
    Variadic,
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub ty: ObjType,
    pub mode: ParamMode,
}

#[derive(Debug, Clone, Copy)]
pub struct BuiltinSig {
    pub name: &'static str,
    pub receiver: ObjType,
    pub kind: CallKind,
    pub params: &'static [Param],
    /// The option kind this builtin's `with` clause takes, if any.
    pub option: Option<OptionKind>,
}

impl BuiltinSig {
    /// Minimum argument count and maximum (`None` = unbounded).
    pub fn arity(&self) -> (usize, Option<usize>) {
        let required = self
            .params
            .iter()
            .filter(|p| p.mode == ParamMode::Required)
            .count();
        if self.params.iter().any(|p| p.mode == ParamMode::Variadic) {
            (required, None)
        } else {
            (required, Some(self.params.len()))
        }
    }
}

const fn req(name: &'static str, ty: ObjType) -> Param {
    Param { name, ty, mode: ParamMode::Required }
}

const fn opt(name: &'static str, ty: ObjType) -> Param {
    Param { name, ty, mode: ParamMode::Optional }
}

const fn var(name: &'static str, ty: ObjType) -> Param {
    Param { name, ty, mode: ParamMode::Variadic }
}

const FS: ObjType = ObjType::Fs;
const STR: ObjType = ObjType::Str;
const INT: ObjType = ObjType::Int;
const BOOL: ObjType = ObjType::Bool;

const fn opt_ty(kind: OptionKind) -> ObjType {
    ObjType::Option(Some(kind))
}

const fn fs_source(
    name: &'static str,
    params: &'static [Param],
    option: Option<OptionKind>,
) -> BuiltinSig {
    BuiltinSig { name, receiver: FS, kind: CallKind::Source, params, option }
}

const fn fs_chain(
    name: &'static str,
    params: &'static [Param],
    option: Option<OptionKind>,
) -> BuiltinSig {
    BuiltinSig { name, receiver: FS, kind: CallKind::Chain, params, option }
}

const fn opt_builtin(
    kind: OptionKind,
    name: &'static str,
    params: &'static [Param],
    option: Option<OptionKind>,
) -> BuiltinSig {
    BuiltinSig {
        name,
        receiver: opt_ty(kind),
        kind: CallKind::Option,
        params,
        option,
    }
}

pub const BUILTINS: &[BuiltinSig] = &[
    // fs sources
    fs_source("scratch", &[], None),
    fs_source("image", &[req("ref", STR)], Some(OptionKind::Image)),
    fs_source("http", &[req("url", STR)], Some(OptionKind::Http)),
    fs_source("git", &[req("remote", STR), req("ref", STR)], Some(OptionKind::Git)),
    fs_source("local", &[req("path", STR)], Some(OptionKind::Local)),
    fs_source("generate", &[req("frontend", FS)], Some(OptionKind::Generate)),
    // fs chains
    fs_chain("run", &[var("arg", STR)], Some(OptionKind::Run)),
    fs_chain("env", &[req("key", STR), req("value", STR)], None),
    fs_chain("dir", &[req("path", STR)], None),
    fs_chain("user", &[req("name", STR)], None),
    fs_chain("entrypoint", &[var("command", STR)], None),
    fs_chain("mkdir", &[req("path", STR), req("mode", INT)], Some(OptionKind::Mkdir)),
    fs_chain(
        "mkfile",
        &[req("path", STR), req("mode", INT), req("content", STR)],
        Some(OptionKind::Mkfile),
    ),
    fs_chain("rm", &[req("path", STR)], Some(OptionKind::Rm)),
    fs_chain(
        "copy",
        &[req("input", FS), req("src", STR), req("dest", STR)],
        Some(OptionKind::Copy),
    ),
    // fs debug
    BuiltinSig {
        name: "breakpoint",
        receiver: FS,
        kind: CallKind::Debug,
        params: &[],
        option: None,
    },
    // string sources
    BuiltinSig {
        name: "value",
        receiver: STR,
        kind: CallKind::Source,
        params: &[req("str", STR)],
        option: None,
    },
    BuiltinSig {
        name: "format",
        receiver: STR,
        kind: CallKind::Source,
        params: &[req("fmt", STR), var("values", STR)],
        option: None,
    },
    // option::image
    opt_builtin(OptionKind::Image, "resolve", &[opt("enabled", BOOL)], None),
    // option::http
    opt_builtin(OptionKind::Http, "checksum", &[req("digest", STR)], None),
    opt_builtin(OptionKind::Http, "chmod", &[req("mode", INT)], None),
    opt_builtin(OptionKind::Http, "filename", &[req("name", STR)], None),
    // option::git
    opt_builtin(OptionKind::Git, "keepGitDir", &[opt("enabled", BOOL)], None),
    // option::local
    opt_builtin(OptionKind::Local, "includePatterns", &[var("pattern", STR)], None),
    opt_builtin(OptionKind::Local, "excludePatterns", &[var("pattern", STR)], None),
    opt_builtin(OptionKind::Local, "followPaths", &[var("path", STR)], None),
    // option::generate
    opt_builtin(
        OptionKind::Generate,
        "frontendInput",
        &[req("key", STR), req("value", FS)],
        None,
    ),
    opt_builtin(
        OptionKind::Generate,
        "frontendOpt",
        &[req("key", STR), req("value", STR)],
        None,
    ),
    // option::run
    opt_builtin(OptionKind::Run, "readonlyRootfs", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Run, "env", &[req("key", STR), req("value", STR)], None),
    opt_builtin(OptionKind::Run, "dir", &[req("path", STR)], None),
    opt_builtin(OptionKind::Run, "user", &[req("name", STR)], None),
    opt_builtin(OptionKind::Run, "network", &[req("mode", STR)], None),
    opt_builtin(OptionKind::Run, "security", &[req("mode", STR)], None),
    opt_builtin(OptionKind::Run, "host", &[req("name", STR), req("address", STR)], None),
    opt_builtin(OptionKind::Run, "ssh", &[], Some(OptionKind::Ssh)),
    opt_builtin(
        OptionKind::Run,
        "secret",
        &[req("mountpoint", STR)],
        Some(OptionKind::Secret),
    ),
    opt_builtin(
        OptionKind::Run,
        "mount",
        &[req("input", FS), req("mountpoint", STR)],
        Some(OptionKind::Mount),
    ),
    // option::ssh
    opt_builtin(OptionKind::Ssh, "target", &[req("path", STR)], None),
    opt_builtin(OptionKind::Ssh, "uid", &[req("id", INT)], None),
    opt_builtin(OptionKind::Ssh, "gid", &[req("id", INT)], None),
    opt_builtin(OptionKind::Ssh, "mode", &[req("filemode", INT)], None),
    // option::secret
    opt_builtin(OptionKind::Secret, "uid", &[req("id", INT)], None),
    opt_builtin(OptionKind::Secret, "gid", &[req("id", INT)], None),
    opt_builtin(OptionKind::Secret, "mode", &[req("filemode", INT)], None),
    // option::mount
    opt_builtin(OptionKind::Mount, "readonly", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Mount, "tmpfs", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Mount, "sourcePath", &[req("path", STR)], None),
    opt_builtin(OptionKind::Mount, "cache", &[req("id", STR), req("sharing", STR)], None),
    // option::mkdir
    opt_builtin(OptionKind::Mkdir, "createParents", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Mkdir, "chown", &[req("owner", STR)], None),
    opt_builtin(OptionKind::Mkdir, "createdTime", &[req("created", STR)], None),
    // option::mkfile
    opt_builtin(OptionKind::Mkfile, "chown", &[req("owner", STR)], None),
    opt_builtin(OptionKind::Mkfile, "createdTime", &[req("created", STR)], None),
    // option::rm
    opt_builtin(OptionKind::Rm, "allowNotFound", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Rm, "allowWildcard", &[opt("enabled", BOOL)], None),
    // option::copy
    opt_builtin(OptionKind::Copy, "followSymlinks", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Copy, "contentsOnly", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Copy, "unpack", &[opt("enabled", BOOL)], None),
    opt_builtin(OptionKind::Copy, "createDestPath", &[opt("enabled", BOOL)], None),
];

/// Looks up a builtin by receiver type and name. Receiver matching is
/// exact: `option::run` builtins are invisible to `option::mount` blocks.
pub fn lookup(receiver: ObjType, name: &str) -> Option<&'static BuiltinSig> {
    BUILTINS
        .iter()
        .find(|sig| sig.receiver == receiver && sig.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_fs_source() {
        let sig = lookup(ObjType::Fs, "image").expect("image should exist");
        assert_eq!(sig.kind, CallKind::Source);
        assert_eq!(sig.option, Some(OptionKind::Image));
        assert_eq!(sig.arity(), (1, Some(1)));
    }

    #[test]
    fn lookup_finds_fs_chain() {
        let sig = lookup(ObjType::Fs, "copy").expect("copy should exist");
        assert_eq!(sig.kind, CallKind::Chain);
        assert_eq!(sig.params[0].ty, ObjType::Fs);
        assert_eq!(sig.arity(), (3, Some(3)));
    }

    #[test]
    fn variadic_arity_is_unbounded() {
        let run = lookup(ObjType::Fs, "run").unwrap();
        assert_eq!(run.arity(), (0, None));

        let git = lookup(ObjType::Fs, "git").unwrap();
        assert_eq!(git.arity(), (2, Some(2)));
    }

    #[test]
    fn optional_flag_params_widen_max_arity() {
        let resolve = lookup(opt_ty(OptionKind::Image), "resolve").unwrap();
        assert_eq!(resolve.arity(), (0, Some(1)));
    }

    #[test]
    fn option_builtins_are_scoped_to_their_kind() {
        assert!(lookup(opt_ty(OptionKind::Run), "mount").is_some());
        assert!(lookup(opt_ty(OptionKind::Mount), "mount").is_none());
        assert!(lookup(opt_ty(OptionKind::Mount), "readonly").is_some());
        assert!(lookup(ObjType::Fs, "readonly").is_none());
    }

    #[test]
    fn string_builtins_are_sources() {
        for name in ["value", "format"] {
            let sig = lookup(ObjType::Str, name).expect(name);
            assert_eq!(sig.kind, CallKind::Source);
        }
    }

    #[test]
    fn breakpoint_is_debug_kind() {
        let sig = lookup(ObjType::Fs, "breakpoint").unwrap();
        assert_eq!(sig.kind, CallKind::Debug);
    }

    #[test]
    fn nested_option_builtins_declare_their_with_kind() {
        let ssh = lookup(opt_ty(OptionKind::Run), "ssh").unwrap();
        assert_eq!(ssh.option, Some(OptionKind::Ssh));
        let secret = lookup(opt_ty(OptionKind::Run), "secret").unwrap();
        assert_eq!(secret.option, Some(OptionKind::Secret));
    }

    #[test]
    fn registry_has_no_duplicate_keys() {
        for (i, a) in BUILTINS.iter().enumerate() {
            for b in &BUILTINS[i + 1..] {
                assert!(
                    !(a.name == b.name && a.receiver == b.receiver),
                    "duplicate builtin ({}, {})",
                    a.receiver,
                    a.name
                );
            }
        }
    }
}
