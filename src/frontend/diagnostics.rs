//! Diagnostics and error reporting for Kuri
//!
//! A [`Diagnostic`] is a source-anchored report with a stable [`DiagnosticKind`]. Validation builds
//! them with a span only; the scheduler anchors them to the file (name and quoted source line) once
//! the failing unit is known.
//!
//! Rendering follows the usual compiler layout:
//!
//! ```text
//! error[redefinition]: redefinition of local variable `x`
//!   --> principal.kuri:3:5
//!    |
//!  3 |     soit x = 2
//!    |          ^
//!    = note: `x` was first declared on line 2
//! ```

use std::fmt;

use crate::frontend::ast::Span;

/// Categorical kind of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    TypeMismatch,
    UnknownSymbol,
    Redefinition,
    InvalidAssignment,
    InvalidControl,
    OverloadResolutionFailed,
    StructureCycle,
    /// A unit was still waiting on a dependency when nothing else could make progress.
    UnresolvedDependency,
}

impl DiagnosticKind {
    /// Stable snake_case code.
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::TypeMismatch => "type_mismatch",
            DiagnosticKind::UnknownSymbol => "unknown_symbol",
            DiagnosticKind::Redefinition => "redefinition",
            DiagnosticKind::InvalidAssignment => "invalid_assignment",
            DiagnosticKind::InvalidControl => "invalid_control",
            DiagnosticKind::OverloadResolutionFailed => "overload_resolution_failed",
            DiagnosticKind::StructureCycle => "structure_cycle",
            DiagnosticKind::UnresolvedDependency => "unresolved_dependency",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A compile-time error with location information
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// Number of underlined characters, at least one.
    pub length: u32,
    pub source_line: String,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            file: String::new(),
            line: span.line,
            column: span.column,
            length: span.len.max(1),
            source_line: String::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Attach the file name and quote the offending line from `source`.
    pub fn anchor(mut self, file: &str, source: &str) -> Self {
        self.file = file.to_string();
        if self.line > 0 {
            self.source_line = source
                .lines()
                .nth(self.line as usize - 1)
                .unwrap_or_default()
                .to_string();
        }
        self
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column, self.length)
    }

    /// Plain-text rendering with a caret under the first character and tildes under the rest.
    pub fn render(&self) -> String {
        let mut out = format!("error[{}]: {}\n", self.kind, self.message);
        out.push_str(&format!("  --> {}:{}:{}\n", self.file, self.line, self.column));
        if !self.source_line.is_empty() {
            let gutter = self.line.to_string().len();
            let pad = " ".repeat(gutter);
            let column = self.column.max(1) as usize;
            out.push_str(&format!(" {pad} |\n"));
            out.push_str(&format!(" {} | {}\n", self.line, self.source_line));
            out.push_str(&format!(
                " {pad} | {}^{}\n",
                " ".repeat(column - 1),
                "~".repeat(self.length.saturating_sub(1) as usize)
            ));
        }
        for note in &self.notes {
            out.push_str(&format!("  = note: {note}\n"));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

// ============================================================================
// Overload rejection reasons
// ============================================================================

/// Why an overload candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Arity { expected: usize, found: usize },
    UnknownName(String),
    DuplicateName(String),
    /// A positional argument follows a named one.
    MissingNameAfterNamed,
    ArgumentType {
        position: usize,
        parameter: String,
        expected: String,
        found: String,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Arity { expected, found } => {
                write!(f, "expected {expected} argument(s), found {found}")
            }
            RejectionReason::UnknownName(name) => write!(f, "unknown argument name `{name}`"),
            RejectionReason::DuplicateName(name) => write!(f, "argument `{name}` is given more than once"),
            RejectionReason::MissingNameAfterNamed => {
                write!(f, "positional argument after a named argument")
            }
            RejectionReason::ArgumentType {
                position,
                parameter,
                expected,
                found,
            } => write!(
                f,
                "argument {} (`{parameter}`) expects `{expected}`, found `{found}`",
                position + 1
            ),
        }
    }
}

/// A candidate listed in an unresolved-overload report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCandidate {
    pub signature: String,
    pub reason: RejectionReason,
}

// ============================================================================
// Error catalog
// ============================================================================

/// Builders for the diagnostics the validator reports.
pub mod errors {
    use super::*;

    pub fn unknown_symbol(what: &str, name: &str, span: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::UnknownSymbol, format!("unknown {what} `{name}`"), span)
    }

    pub fn local_redefinition(name: &str, span: Span, previous: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::Redefinition,
            format!("redefinition of local variable `{name}`"),
            span,
        )
        .with_note(format!("`{name}` was first declared on line {}", previous.line))
    }

    pub fn global_redefinition(name: &str, span: Span, previous: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::Redefinition,
            format!("`{name}` redefines a global variable"),
            span,
        )
        .with_note(format!("the global is declared on line {}", previous.line))
    }

    pub fn redefinition(what: &str, name: &str, span: Span, previous: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Redefinition, format!("redefinition of {what} `{name}`"), span)
            .with_note(format!("first declared on line {}", previous.line))
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::TypeMismatch, message, span)
    }

    pub fn argument_type_mismatch(parameter: &str, expected: &str, found: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            format!("argument `{parameter}` expects type `{expected}`, found `{found}`"),
            span,
        )
    }

    pub fn return_type_mismatch(expected: &str, found: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            format!("returned value has type `{found}` but the function returns `{expected}`"),
            span,
        )
    }

    pub fn assignment_type_mismatch(target: &str, value: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            format!("cannot assign a value of type `{value}` to a target of type `{target}`"),
            span,
        )
        .with_note(format!("target type: `{target}`"))
        .with_note(format!("value type:  `{value}`"))
    }

    pub fn invalid_assignment(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::InvalidAssignment, message, span)
    }

    pub fn invalid_control(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::InvalidControl, message, span)
    }

    pub fn unresolved_overload(name: &str, candidates: &[RejectedCandidate], span: Span) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(
            DiagnosticKind::OverloadResolutionFailed,
            format!("no overload of `{name}` accepts these arguments"),
            span,
        );
        for candidate in candidates {
            diagnostic = diagnostic.with_note(format!("candidate `{}`: {}", candidate.signature, candidate.reason));
        }
        diagnostic
    }

    pub fn structure_cycle(structure: &str, field: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::StructureCycle,
            format!("`{structure}` contains itself by value through field `{field}`"),
            span,
        )
        .with_note("use a pointer to refer to the structure from its own fields")
    }

    pub fn unresolved_dependency(name: &str, waiting_on: &str, span: Span) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::UnresolvedDependency,
            format!("`{name}` could not be validated: waiting on {waiting_on}"),
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_underlines_token() {
        let diagnostic = errors::local_redefinition("total", Span::new(3, 10, 5), Span::new(2, 10, 5))
            .anchor("principal.kuri", "principale :: fonc ()\n    dyn total = 0\n    dyn total = 1\n");
        let rendered = diagnostic.render();
        assert!(rendered.starts_with("error[redefinition]: redefinition of local variable `total`\n"));
        assert!(rendered.contains("  --> principal.kuri:3:10\n"));
        assert!(rendered.contains(" 3 |     dyn total = 1\n"));
        assert!(rendered.contains("   |          ^~~~~\n"));
        assert!(rendered.contains("= note: `total` was first declared on line 2"));
    }

    #[test]
    fn test_render_without_source() {
        let diagnostic = errors::unknown_symbol("variable", "x", Span::new(1, 1, 1));
        let rendered = diagnostic.render();
        assert_eq!(rendered, "error[unknown_symbol]: unknown variable `x`\n  --> :1:1\n");
    }

    #[test]
    fn test_rejection_reason_wording() {
        assert_eq!(RejectionReason::UnknownName("a".into()).to_string(), "unknown argument name `a`");
        assert_eq!(
            RejectionReason::Arity { expected: 2, found: 1 }.to_string(),
            "expected 2 argument(s), found 1"
        );
    }

    #[test]
    fn test_zero_length_span_underlines_one_character() {
        let diagnostic = Diagnostic::new(DiagnosticKind::InvalidControl, "m", Span::new(1, 2, 0));
        assert_eq!(diagnostic.length, 1);
    }
}
