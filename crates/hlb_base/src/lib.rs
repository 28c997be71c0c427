//! Structural atoms shared by every stage of the HLB compiler.
//!
//! This crate holds the pieces that the lexer, parser, type checker, and
//! code generator all agree on: source [`Position`]s, [`Span`]s, and the
//! caret-underline snippet rendering used by spanned diagnostics.

pub mod error;
pub mod span;

pub use error::{line_context, render_snippet};
pub use span::{Position, Span};
