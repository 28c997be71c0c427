//! Front-end integration tests: parse, check, and format working
//! together on whole programs.

use hlb_language::ast::{Decl, Expr, File, Stmt};
use hlb_language::{check, format_file, parse};
use pretty_assertions::assert_eq;

const BUILD_PROGRAM: &str = r#"# Builds the release image.
fs default() {
	image "golang:1.21-alpine"
	run "go build -o /out/app ./cmd" with option {
		dir "/src"
		mount fs {
			local "."
		} "/src"
		mount scratch "/out" as binaries
	}
}

fs release() {
	image "alpine"
	copy binaries "/app" "/usr/bin/app"
	entrypoint "/usr/bin/app"
}

export release
"#;

fn parse_clean(source: &str) -> File {
    let (file, errors) = parse(source, "build.hlb");
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    file
}

fn check_clean(source: &str) -> File {
    let mut file = parse_clean(source);
    let diagnostics = check(&mut file);
    assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
    file
}

#[test]
fn realistic_program_parses_checks_and_formats() {
    let file = check_clean(BUILD_PROGRAM);
    assert_eq!(format_file(&file), BUILD_PROGRAM);
}

#[test]
fn formatting_is_idempotent_on_messy_input() {
    let messy =
        "fs a() { image \"x\"; run \"make\" with option { dir \"/s\"; }; }\n\n\n\nfs b() { a; }\n";
    let once = format_file(&parse_clean(messy));
    let twice = format_file(&parse_clean(&once));
    assert_eq!(once, twice);
}

#[test]
fn empty_file_parses_and_checks() {
    let mut file = parse_clean("");
    assert!(check(&mut file).is_empty());
    assert_eq!(format_file(&file), "");
}

#[test]
fn comment_only_file_is_preserved() {
    let source = "# nothing to build here\n# just notes\n";
    let file = check_clean(source);
    assert_eq!(format_file(&file), source);
}

#[test]
fn positions_are_monotonic_across_the_whole_file() {
    let file = parse_clean(BUILD_PROGRAM);
    let mut last_end = 0usize;
    for decl in &file.decls {
        let span = decl.span();
        assert!(span.start.offset <= span.end.offset, "inverted span: {:?}", span);
        assert!(
            span.start.offset >= last_end,
            "overlapping decls at offset {}",
            span.start.offset
        );
        last_end = span.end.offset;
    }
}

#[test]
fn every_ident_in_checked_file_resolves() {
    let file = check_clean(BUILD_PROGRAM);

    fn walk_block(file: &File, block: &hlb_language::ast::BlockStmt) {
        for stmt in &block.stmts {
            let Stmt::Call(call) = stmt else { continue };
            for arg in &call.args {
                if let Expr::Func(lit) = arg {
                    walk_block(file, &lit.body);
                }
            }
            if let Some(with) = &call.with {
                if let Expr::Func(lit) = &with.expr {
                    walk_block(file, &lit.body);
                }
            }
        }
    }
    for decl in &file.decls {
        if let Decl::Func(func) = decl {
            assert!(file.scope.contains(&func.name.name));
            if let Some(body) = &func.body {
                walk_block(&file, body);
            }
        }
    }
    // The alias declared inside `default` is addressable at file level.
    assert!(file.scope.contains("binaries"));
    assert!(file.scope.is_exported("release"));
}

#[test]
fn bad_declaration_does_not_poison_later_ones() {
    let source = "fs broken( {\n\tscratch\n}\n\nfs good() {\n\tscratch\n}\n\nexport good\n";
    let (mut file, errors) = parse(source, "build.hlb");
    assert!(!errors.is_empty());
    let diagnostics = check(&mut file);
    assert!(diagnostics.is_empty(), "good decls should check: {:?}", diagnostics);
    assert!(file.scope.is_exported("good"));
}

#[test]
fn semicolons_and_newlines_parse_identically() {
    let semis = "fs d() { image \"x\"; run \"y\"; }\n";
    let newlines = "fs d() {\n\timage \"x\"\n\trun \"y\"\n}\n";
    assert_eq!(
        format_file(&parse_clean(semis)),
        format_file(&parse_clean(newlines))
    );
}
