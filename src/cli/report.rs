//! Terminal rendering of diagnostics through miette.

use std::collections::HashMap;

use miette::{LabeledSpan, MietteDiagnostic, NamedSource, Report, Severity, SourceSpan};

use crate::frontend::diagnostics::Diagnostic;
use crate::frontend::scheduler::ValidatedProgram;

/// Convert a diagnostic into a miette report.
///
/// With the source text available the report quotes it and labels the span; without it the report
/// still carries the `file:line:column` position in its message.
pub fn to_report(diagnostic: &Diagnostic, source: Option<&str>) -> Report {
    let mut report = MietteDiagnostic::new(diagnostic.message.clone())
        .with_code(format!("kuri::{}", diagnostic.kind))
        .with_severity(Severity::Error);
    if !diagnostic.notes.is_empty() {
        report = report.with_help(diagnostic.notes.join("\n"));
    }

    let span = source.and_then(|text| byte_span(text, diagnostic.line, diagnostic.column, diagnostic.length));
    match (source, span) {
        (Some(text), Some(span)) => {
            let report = report.with_label(LabeledSpan::at(span, diagnostic.kind.code()));
            Report::new(report).with_source_code(NamedSource::new(&diagnostic.file, text.to_string()))
        }
        _ => {
            report.message = format!("{diagnostic}");
            Report::new(report)
        }
    }
}

/// Print every diagnostic of `program` to stderr, in report order.
pub fn print_diagnostics(program: &ValidatedProgram) {
    let sources: HashMap<&str, &str> = program
        .files
        .iter()
        .filter(|f| !f.source.is_empty())
        .map(|f| (f.path.as_str(), f.source.as_str()))
        .collect();
    for diagnostic in program.diagnostics() {
        let report = to_report(diagnostic, sources.get(diagnostic.file.as_str()).copied());
        eprintln!("{report:?}");
    }
}

/// Byte range of a 1-based line/column span, clamped to the end of its line.
fn byte_span(source: &str, line: u32, column: u32, length: u32) -> Option<SourceSpan> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    let mut lines = source.split_inclusive('\n');
    for _ in 1..line {
        offset += lines.next()?.len();
    }
    let text = lines.next()?.trim_end_matches(['\n', '\r']);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let first = column.max(1) as usize - 1;
    let start = chars.get(first).map_or(text.len(), |(at, _)| *at);
    let end = chars
        .get(first + length.max(1) as usize)
        .map_or(text.len(), |(at, _)| *at);
    Some(SourceSpan::from((offset + start, end.saturating_sub(start))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::frontend::ast::Span;
    use crate::frontend::diagnostics::DiagnosticKind;

    #[test]
    fn test_byte_span_on_later_line() {
        let source = "a\nbcd efg\n";
        let span = byte_span(source, 2, 5, 3).unwrap();
        assert_eq!(span.offset(), 6);
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn test_byte_span_counts_characters_not_bytes() {
        let source = "soit é = 1\n";
        let span = byte_span(source, 1, 8, 1).unwrap();
        assert_eq!(&source[span.offset()..span.offset() + span.len()], "=");
    }

    #[test]
    fn test_byte_span_past_end_of_file() {
        assert!(byte_span("a\n", 4, 1, 1).is_none());
        assert!(byte_span("a\n", 0, 1, 1).is_none());
    }

    #[test]
    fn test_report_carries_code_and_help() {
        let diagnostic = Diagnostic::new(DiagnosticKind::Redefinition, "redefinition of `x`", Span::new(2, 5, 1))
            .with_note("`x` was first declared on line 1")
            .anchor("principal.kuri", "dyn x = 1\ndyn x = 2\n");
        let report = to_report(&diagnostic, Some("dyn x = 1\ndyn x = 2\n"));
        assert_eq!(report.code().unwrap().to_string(), "kuri::redefinition");
        assert_eq!(report.help().unwrap().to_string(), "`x` was first declared on line 1");
        assert_eq!(report.labels().unwrap().count(), 1);
    }

    #[test]
    fn test_report_without_source_keeps_position() {
        let diagnostic = Diagnostic::new(DiagnosticKind::UnknownSymbol, "unknown symbol `y`", Span::new(3, 1, 1))
            .anchor("principal.kuri", "");
        let report = to_report(&diagnostic, None);
        assert_eq!(report.to_string(), "principal.kuri:3:1: unknown symbol `y`");
    }
}
