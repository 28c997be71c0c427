//! Source-snippet rendering for spanned diagnostics.
//!
//! Every HLB diagnostic carries a [`Span`]. The helpers here turn a span
//! plus the original source into the familiar compiler-style excerpt:
//!
//! ```text
//!    2 | run "echo hi" with option { mount scratch "/in" }
//!      |                             ^^^^^
//! ```
//!
//! The error enums themselves live with the stage that produces them
//! (parser, checker, code generator); they all call [`render_snippet`] from
//! their `display_with_source` methods.

use crate::span::Span;

/// Locates the line containing `offset`.
///
/// Returns `(line_number, line_start_offset, line_text)`. `line_number` is
/// 1-based. An offset past the end of the source maps to the last line.
pub fn line_context(source: &str, offset: usize) -> (usize, usize, &str) {
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());

    (line_num, line_start, &source[line_start..line_end])
}

/// Renders the line containing `span` with a caret underline beneath the
/// spanned bytes.
///
/// Spans reaching past the end of their line are clamped to it, so a span
/// covering a whole block still renders a single sensible excerpt.
pub fn render_snippet(source: &str, span: Span) -> String {
    let (line_num, line_start, line) = line_context(source, span.start.offset);
    let col = span.start.offset.saturating_sub(line_start);
    let len = span.len().max(1).min(line.len().saturating_sub(col).max(1));
    let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

    format!("{:4} | {}\n     | {}", line_num, line, underline)
}
