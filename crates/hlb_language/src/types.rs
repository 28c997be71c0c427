//! The HLB type vocabulary.
//!
//! HLB is statically typed with a deliberately small universe: four value
//! types (`string`, `int`, `bool`, `fs`) plus the `option` family. An
//! option type may carry a sub-kind (`option::run`, `option::mount`, ...)
//! selecting which option builtins are legal inside a block of that type.
//!
//! Type equality used by the checker is on the *principal* type: every
//! `option::<kind>` is principally `option`. The kind is compared
//! separately wherever both sides know theirs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-kind of an `option` type, naming the builtin family it configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Image,
    Http,
    Git,
    Local,
    Generate,
    Run,
    Ssh,
    Secret,
    Mount,
    Mkdir,
    Mkfile,
    Rm,
    Copy,
}

impl OptionKind {
    pub fn parse(text: &str) -> Option<OptionKind> {
        Some(match text {
            "image" => OptionKind::Image,
            "http" => OptionKind::Http,
            "git" => OptionKind::Git,
            "local" => OptionKind::Local,
            "generate" => OptionKind::Generate,
            "run" => OptionKind::Run,
            "ssh" => OptionKind::Ssh,
            "secret" => OptionKind::Secret,
            "mount" => OptionKind::Mount,
            "mkdir" => OptionKind::Mkdir,
            "mkfile" => OptionKind::Mkfile,
            "rm" => OptionKind::Rm,
            "copy" => OptionKind::Copy,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Image => "image",
            OptionKind::Http => "http",
            OptionKind::Git => "git",
            OptionKind::Local => "local",
            OptionKind::Generate => "generate",
            OptionKind::Run => "run",
            OptionKind::Ssh => "ssh",
            OptionKind::Secret => "secret",
            OptionKind::Mount => "mount",
            OptionKind::Mkdir => "mkdir",
            OptionKind::Mkfile => "mkfile",
            OptionKind::Rm => "rm",
            OptionKind::Copy => "copy",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type in the HLB surface language.
///
/// `Option(None)` is the bare `option` type as written in block literals
/// whose kind is inferred from context; `Option(Some(kind))` is the
/// explicit `option::<kind>` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjType {
    Str,
    Int,
    Bool,
    Fs,
    Option(Option<OptionKind>),
}

impl ObjType {
    /// Parses a type name as written in source, including the
    /// `option::<kind>` form. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<ObjType> {
        Some(match text {
            "string" => ObjType::Str,
            "int" => ObjType::Int,
            "bool" => ObjType::Bool,
            "fs" => ObjType::Fs,
            "option" => ObjType::Option(None),
            _ => {
                let kind = text.strip_prefix("option::")?;
                ObjType::Option(Some(OptionKind::parse(kind)?))
            }
        })
    }

    /// Equality on the principal type: all option kinds are principally
    /// `option`.
    pub fn principal_eq(self, other: ObjType) -> bool {
        matches!(
            (self, other),
            (ObjType::Str, ObjType::Str)
                | (ObjType::Int, ObjType::Int)
                | (ObjType::Bool, ObjType::Bool)
                | (ObjType::Fs, ObjType::Fs)
                | (ObjType::Option(_), ObjType::Option(_))
        )
    }

    /// Full compatibility: principal types match, and option kinds match
    /// wherever both sides carry one.
    pub fn compatible(self, other: ObjType) -> bool {
        match (self, other) {
            (ObjType::Option(Some(a)), ObjType::Option(Some(b))) => a == b,
            _ => self.principal_eq(other),
        }
    }

    pub fn option_kind(self) -> Option<OptionKind> {
        match self {
            ObjType::Option(kind) => kind,
            _ => None,
        }
    }

    pub fn is_option(self) -> bool {
        matches!(self, ObjType::Option(_))
    }
}

impl fmt::Display for ObjType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjType::Str => f.write_str("string"),
            ObjType::Int => f.write_str("int"),
            ObjType::Bool => f.write_str("bool"),
            ObjType::Fs => f.write_str("fs"),
            ObjType::Option(None) => f.write_str("option"),
            ObjType::Option(Some(kind)) => write!(f, "option::{}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_types() {
        assert_eq!(ObjType::parse("string"), Some(ObjType::Str));
        assert_eq!(ObjType::parse("int"), Some(ObjType::Int));
        assert_eq!(ObjType::parse("bool"), Some(ObjType::Bool));
        assert_eq!(ObjType::parse("fs"), Some(ObjType::Fs));
        assert_eq!(ObjType::parse("option"), Some(ObjType::Option(None)));
    }

    #[test]
    fn parse_option_kinds() {
        assert_eq!(
            ObjType::parse("option::run"),
            Some(ObjType::Option(Some(OptionKind::Run)))
        );
        assert_eq!(
            ObjType::parse("option::mkfile"),
            Some(ObjType::Option(Some(OptionKind::Mkfile)))
        );
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(ObjType::parse("filesystem"), None);
        assert_eq!(ObjType::parse("option::volume"), None);
        assert_eq!(ObjType::parse("option::"), None);
    }

    #[test]
    fn principal_equality_ignores_option_kind() {
        let run = ObjType::Option(Some(OptionKind::Run));
        let mount = ObjType::Option(Some(OptionKind::Mount));
        let bare = ObjType::Option(None);
        assert!(run.principal_eq(mount));
        assert!(run.principal_eq(bare));
        assert!(!run.principal_eq(ObjType::Fs));
    }

    #[test]
    fn compatibility_compares_known_kinds() {
        let run = ObjType::Option(Some(OptionKind::Run));
        let mount = ObjType::Option(Some(OptionKind::Mount));
        let bare = ObjType::Option(None);
        assert!(run.compatible(run));
        assert!(run.compatible(bare));
        assert!(bare.compatible(mount));
        assert!(!run.compatible(mount));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for ty in [
            ObjType::Str,
            ObjType::Fs,
            ObjType::Option(None),
            ObjType::Option(Some(OptionKind::Copy)),
        ] {
            assert_eq!(ObjType::parse(&ty.to_string()), Some(ty));
        }
    }
}
