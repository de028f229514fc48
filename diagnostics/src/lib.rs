//! Structured diagnostics for the Dang core
//!
//! Errors raised during inference and evaluation carry a kind, a message, an
//! optional source location and a chain of causes. This crate gives them a
//! uniform shape ([`Diagnostic`]) plus a plain-text formatter for embedders
//! that want terminal output. The core itself never prints.

use std::fmt;

pub use source_map::{SourceFile, SourceLocation, SourceMap, SourcePosition};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
            DiagnosticSeverity::Hint => write!(f, "hint"),
        }
    }
}

/// Style for diagnostic labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// A message attached to a location
#[derive(Debug, Clone)]
pub struct Label {
    pub location: SourceLocation,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    pub fn secondary(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

/// A diagnostic message with severity, code, and optional location
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: Option<String>,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub help: Vec<String>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Collection of diagnostics
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            diagnostics: iter.into_iter().collect(),
        }
    }
}

/// Builder for creating diagnostics
pub struct DiagnosticBuilder {
    diagnostic: Diagnostic,
}

impl DiagnosticBuilder {
    fn new(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            diagnostic: Diagnostic {
                severity,
                code: None,
                message: message.into(),
                location: None,
                labels: vec![],
                notes: vec![],
                help: vec![],
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Info, message)
    }

    pub fn hint(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Hint, message)
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.diagnostic.code = Some(code.into());
        self
    }

    pub fn location(mut self, location: Option<SourceLocation>) -> Self {
        self.diagnostic.location = location;
        self
    }

    pub fn label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.diagnostic.labels.push(Label::primary(location, message));
        self
    }

    pub fn secondary_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.diagnostic.labels.push(Label::secondary(location, message));
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.diagnostic.notes.push(note.into());
        self
    }

    pub fn help(mut self, help_msg: impl Into<String>) -> Self {
        self.diagnostic.help.push(help_msg.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        self.diagnostic
    }
}

/// Plain-text formatter for diagnostics
#[derive(Debug, Default)]
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors() -> Self {
        Self { use_colors: true }
    }

    pub fn format_diagnostics(&self, diagnostics: &Diagnostics, source_map: &SourceMap) -> String {
        diagnostics
            .diagnostics
            .iter()
            .map(|d| self.format_diagnostic(d, source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic, source_map: &SourceMap) -> String {
        let mut output = String::new();

        let code = diagnostic
            .code
            .as_ref()
            .map(|c| format!("[{}]", c))
            .unwrap_or_default();
        if self.use_colors {
            let color = match diagnostic.severity {
                DiagnosticSeverity::Error => "\x1b[31m",
                DiagnosticSeverity::Warning => "\x1b[33m",
                DiagnosticSeverity::Info => "\x1b[36m",
                DiagnosticSeverity::Hint => "\x1b[32m",
            };
            output.push_str(&format!(
                "{}{}{}\x1b[0m: \x1b[1m{}\x1b[0m\n",
                color, diagnostic.severity, code, diagnostic.message
            ));
        } else {
            output.push_str(&format!("{}{}: {}\n", diagnostic.severity, code, diagnostic.message));
        }

        if let Some(loc) = &diagnostic.location {
            output.push_str(&format!("  --> {}\n", loc));

            if let Some(line) = source_map.line_for(loc) {
                let gutter = loc.line().to_string().len();
                let padding = " ".repeat(loc.column().saturating_sub(1));
                let underline = "^".repeat(loc.length.max(1));
                let label = diagnostic
                    .labels
                    .iter()
                    .find(|l| l.style == LabelStyle::Primary)
                    .map(|l| format!(" {}", l.message))
                    .unwrap_or_default();

                output.push_str(&format!("{:width$} |\n", "", width = gutter));
                output.push_str(&format!("{} | {}\n", loc.line(), line));
                output.push_str(&format!(
                    "{:width$} | {}{}{}\n",
                    "",
                    padding,
                    underline,
                    label,
                    width = gutter
                ));
            }
        }

        for label in diagnostic.labels.iter().filter(|l| l.style == LabelStyle::Secondary) {
            output.push_str(&format!("  --> {}: {}\n", label.location, label.message));
        }

        for help_msg in &diagnostic.help {
            output.push_str(&format!("     help: {}\n", help_msg));
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("note: {}\n", note));
        }

        output
    }
}

/// Result type that includes diagnostics
pub type DiagnosticResult<T> = Result<T, Diagnostics>;
