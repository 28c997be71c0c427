//! The build-graph intermediate representation emitted by the evaluator.
//!
//! An [`FsState`] is an ordered list of operations rooted at the empty
//! filesystem; the graph is emitted exactly as written, never optimized.
//! Filesystem inputs to an operation (`copy`'s source, `run`'s mounts, a
//! frontend image) embed the full subgraph that produces them, so a state
//! is a self-contained tree the consuming build engine can translate into
//! its own representation.
//!
//! Everything here derives `Serialize`/`Deserialize` and structural
//! equality: emitted graphs can be snapshotted, diffed, and compared
//! across runs, which is also how the determinism guarantee is tested.

use std::fmt;

use hlb_language::ast::IntBase;
use hlb_language::types::OptionKind;
use serde::{Deserialize, Serialize};

/// A filesystem state: the identity (scratch) plus the operations applied
/// to it, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsState {
    pub ops: Vec<FsOp>,
}

impl FsState {
    /// The empty filesystem.
    pub fn scratch() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: FsOp) {
        self.ops.push(op);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsOp {
    Image { reference: String, options: Vec<ImageOption> },
    Http { url: String, options: Vec<HttpOption> },
    Git { remote: String, reference: String, options: Vec<GitOption> },
    /// A host directory; `id` is the opaque key recorded in
    /// `GenInfo.locals`.
    Local { id: String, options: Vec<LocalOption> },
    /// Delegates graph construction to a frontend image.
    Frontend { source: Box<FsState>, options: Vec<FrontendOption> },
    Run { command: String, options: Vec<RunOption> },
    Env { key: String, value: String },
    Dir { path: String },
    User { name: String },
    Entrypoint { args: Vec<String> },
    Mkdir { path: String, mode: u32, options: Vec<MkdirOption> },
    Mkfile { path: String, mode: u32, content: String, options: Vec<MkfileOption> },
    Rm { path: String, options: Vec<RmOption> },
    Copy { input: Box<FsState>, src: String, dest: String, options: Vec<CopyOption> },
    /// The filesystem visible at `mountpoint` after `exec` ran: the
    /// subgraph an aliased `mount` hands to sibling statements.
    MountOutput { exec: Box<FsState>, mountpoint: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageOption {
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpOption {
    Checksum(String),
    Chmod(u32),
    Filename(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitOption {
    KeepGitDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalOption {
    IncludePatterns(Vec<String>),
    ExcludePatterns(Vec<String>),
    FollowPaths(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontendOption {
    Input { key: String, value: FsState },
    Opt { key: String, value: String },
    IgnoreCache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOption {
    ReadonlyRootfs,
    Env { key: String, value: String },
    Dir { path: String },
    User { name: String },
    Network(NetworkMode),
    Security(SecurityMode),
    Host { name: String, address: String },
    Ssh { options: Vec<SshOption> },
    Secret { mountpoint: String, options: Vec<SecretOption> },
    Mount { input: FsState, mountpoint: String, options: Vec<MountOption> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SshOption {
    Target(String),
    Uid(u32),
    Gid(u32),
    Mode(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretOption {
    Uid(u32),
    Gid(u32),
    Mode(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountOption {
    Readonly,
    Tmpfs,
    SourcePath(String),
    Cache { id: String, sharing: CacheSharing },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MkdirOption {
    CreateParents,
    Chown(String),
    /// RFC 3339 timestamp, validated at evaluation and kept as written.
    CreatedTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MkfileOption {
    Chown(String),
    CreatedTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RmOption {
    AllowNotFound,
    AllowWildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyOption {
    FollowSymlinks,
    ContentsOnly,
    Unpack,
    CreateDestPath,
}

/// Container network mode for `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Unset,
    Host,
    Node,
}

impl NetworkMode {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "unset" => NetworkMode::Unset,
            "host" => NetworkMode::Host,
            "node" => NetworkMode::Node,
            _ => return None,
        })
    }
}

/// Sandboxing mode for `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    Sandbox,
    Insecure,
}

impl SecurityMode {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "sandbox" => SecurityMode::Sandbox,
            "insecure" => SecurityMode::Insecure,
            _ => return None,
        })
    }
}

/// Concurrency mode of a cache mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSharing {
    Shared,
    Private,
    Locked,
}

impl CacheSharing {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "shared" => CacheSharing::Shared,
            "private" => CacheSharing::Private,
            "locked" => CacheSharing::Locked,
            _ => return None,
        })
    }
}

/// An integer with the radix it was written in. Comparison is numeric;
/// the base only matters when printing the value back.
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
pub struct IntValue {
    pub value: i64,
    pub base: IntBase,
}

impl PartialEq for IntValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base {
            IntBase::Binary => write!(f, "0b{:b}", self.value),
            IntBase::Octal => write!(f, "0o{:o}", self.value),
            IntBase::Decimal => write!(f, "{}", self.value),
            IntBase::Hex => write!(f, "0x{:X}", self.value),
        }
    }
}

/// A kind-tagged list of option items, the value of an option block or a
/// named options function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionList {
    pub kind: OptionKind,
    pub items: Vec<OptItem>,
}

/// One evaluated option item, tagged with the family it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptItem {
    Image(ImageOption),
    Http(HttpOption),
    Git(GitOption),
    Local(LocalOption),
    Frontend(FrontendOption),
    Run(RunOption),
    Ssh(SshOption),
    Secret(SecretOption),
    Mount(MountOption),
    Mkdir(MkdirOption),
    Mkfile(MkfileOption),
    Rm(RmOption),
    Copy(CopyOption),
}

/// A value produced by the evaluator: the semantic variants of the
/// language's types. `StrList` is the binding of a variadic string
/// parameter, spread back out where a variadic argument is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Fs(FsState),
    Str(String),
    Int(IntValue),
    Bool(bool),
    Options(OptionList),
    StrList(Vec<String>),
}

impl Value {
    /// Short variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Fs(_) => "fs",
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Options(_) => "option",
            Value::StrList(_) => "variadic string",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_is_empty() {
        assert!(FsState::scratch().ops.is_empty());
    }

    #[test]
    fn int_values_compare_numerically_across_bases() {
        let octal = IntValue { value: 0o755, base: IntBase::Octal };
        let decimal = IntValue { value: 493, base: IntBase::Decimal };
        assert_eq!(octal, decimal);
    }

    #[test]
    fn int_values_display_in_their_base() {
        assert_eq!(IntValue { value: 0o755, base: IntBase::Octal }.to_string(), "0o755");
        assert_eq!(IntValue { value: 0x1f, base: IntBase::Hex }.to_string(), "0x1F");
        assert_eq!(IntValue { value: 5, base: IntBase::Binary }.to_string(), "0b101");
        assert_eq!(IntValue { value: 42, base: IntBase::Decimal }.to_string(), "42");
    }

    #[test]
    fn mode_strings_parse_to_enums() {
        assert_eq!(NetworkMode::parse("host"), Some(NetworkMode::Host));
        assert_eq!(NetworkMode::parse("bridge"), None);
        assert_eq!(SecurityMode::parse("insecure"), Some(SecurityMode::Insecure));
        assert_eq!(SecurityMode::parse("root"), None);
        assert_eq!(CacheSharing::parse("locked"), Some(CacheSharing::Locked));
        assert_eq!(CacheSharing::parse("exclusive"), None);
    }

    #[test]
    fn states_compare_structurally() {
        let mut a = FsState::scratch();
        a.push(FsOp::Image { reference: "alpine".into(), options: vec![] });
        let mut b = FsState::scratch();
        b.push(FsOp::Image { reference: "alpine".into(), options: vec![] });
        assert_eq!(a, b);

        b.push(FsOp::Dir { path: "/src".into() });
        assert_ne!(a, b);
    }
}
