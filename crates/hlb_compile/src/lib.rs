//! Build-graph code generation for HLB.
//!
//! Takes checked files from `hlb-language` and emits the build-graph IR
//! a content-addressed build engine consumes:
//!
//! - [`ir`]: the serializable graph value types ([`ir::FsState`] and
//!   friends) the evaluator produces.
//! - [`codegen`]: the evaluator itself. [`codegen::generate`] walks a
//!   target function and its transitive dependencies.
//! - [`compile`]: the one-call pipeline from source text to graph.
//!
//! ```
//! use hlb_compile::{compile, GenOptions};
//!
//! let (state, info) =
//!     compile("fs default() {\n\tscratch\n}\n", "build.hlb", "default", GenOptions::default())
//!         .unwrap();
//! assert!(state.ops.is_empty());
//! assert!(info.locals.is_empty());
//! ```

pub mod codegen;
pub mod compile;
pub mod error;
pub mod ir;
pub mod shellquote;

pub use codegen::{generate, Debugger, Frame, GenInfo, GenOptions, ImportResolver};
pub use compile::{compile, CompileError};
pub use error::{EvalError, EvalErrorKind, GenError};
pub use ir::{FsOp, FsState, OptionList, Value};
