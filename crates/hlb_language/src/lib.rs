//! The HLB language front end.
//!
//! HLB is a small, statically typed build language: a program declares
//! filesystem-producing functions whose bodies are ordered chains of
//! operations (pull an image, run a command, mount directories, copy
//! files). This crate takes source text to a checked concrete syntax
//! tree; the `hlb-compile` crate walks that tree to emit the build graph.
//!
//! The pipeline, leaves first:
//!
//! - [`lexer`]: tokenizes source into a flat stream with positions.
//! - [`parser`]: recursive descent to a trivia-preserving CST.
//! - [`checker`]: binds names into the file scope and enforces the type
//!   rules, driven by the shared [`builtin`] registry.
//! - [`format`]: prints any CST back to canonical source.
//!
//! ```
//! use hlb_language::{check, parse};
//!
//! let (mut file, errors) = parse("fs default() {\n\tscratch\n}\n", "build.hlb");
//! assert!(errors.is_empty());
//! assert!(check(&mut file).is_empty());
//! ```

pub mod ast;
pub mod builtin;
pub mod checker;
pub mod error;
pub mod format;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;

pub use checker::check;
pub use error::{CheckError, CheckErrorKind, ParseError, ParseErrorKind};
pub use format::format_file;
pub use parser::parse;
pub use types::{ObjType, OptionKind};
