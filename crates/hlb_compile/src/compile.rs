//! End-to-end compilation pipeline: source text to build graph.
//!
//! Wires the front end to the code generator: parse, check, generate.
//! Parse and check failures return every accumulated diagnostic;
//! generation aborts on its first error.

use hlb_language::{check, parse, CheckError, ParseError};
use log::debug;

use crate::codegen::{generate, GenInfo, GenOptions};
use crate::error::GenError;
use crate::ir::FsState;

/// Errors from any stage of [`compile`].
#[derive(Debug)]
pub enum CompileError {
    Parse(Vec<ParseError>),
    Check(Vec<CheckError>),
    Gen(GenError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(errors) => match errors.first() {
                Some(first) if errors.len() == 1 => write!(f, "parse error: {}", first),
                Some(first) => {
                    write!(f, "{} parse errors, first: {}", errors.len(), first)
                }
                None => write!(f, "parse error"),
            },
            CompileError::Check(errors) => match errors.first() {
                Some(first) if errors.len() == 1 => write!(f, "check error: {}", first),
                Some(first) => {
                    write!(f, "{} check errors, first: {}", errors.len(), first)
                }
                None => write!(f, "check error"),
            },
            CompileError::Gen(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compiles `source` and generates the build graph for `target`.
pub fn compile(
    source: &str,
    filename: &str,
    target: &str,
    opts: GenOptions,
) -> Result<(FsState, GenInfo), CompileError> {
    debug!("compiling {} for target '{}'", filename, target);
    let (mut file, errors) = parse(source, filename);
    if !errors.is_empty() {
        return Err(CompileError::Parse(errors));
    }
    let diagnostics = check(&mut file);
    if !diagnostics.is_empty() {
        return Err(CompileError::Check(diagnostics));
    }
    generate(&file, target, opts).map_err(CompileError::Gen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FsOp;

    #[test]
    fn compiles_minimal_program() {
        let (state, info) = compile(
            "fs default() {\n\tscratch\n}\n",
            "build.hlb",
            "default",
            GenOptions::default(),
        )
        .expect("should compile");
        assert!(state.ops.is_empty());
        assert!(info.locals.is_empty());
    }

    #[test]
    fn reports_parse_errors() {
        let err = compile("fs broken( {\n", "build.hlb", "broken", GenOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn reports_check_errors() {
        let err = compile(
            "fs a() {\n\tmissing\n}\n",
            "build.hlb",
            "a",
            GenOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Check(_)), "got {:?}", err);
    }

    #[test]
    fn reports_generation_errors() {
        let err = compile(
            "fs a() {\n\tscratch\n}\n",
            "build.hlb",
            "nonexistent",
            GenOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonexistent"), "got {}", err);
    }

    #[test]
    fn pipeline_emits_ops() {
        let (state, _) = compile(
            "fs default() {\n\timage \"alpine\"\n\trun \"echo hi\"\n}\n",
            "build.hlb",
            "default",
            GenOptions::default(),
        )
        .expect("should compile");
        assert_eq!(state.ops.len(), 2);
        assert!(matches!(&state.ops[0], FsOp::Image { reference, .. } if reference == "alpine"));
    }
}
