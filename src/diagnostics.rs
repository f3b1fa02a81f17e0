//! Structured findings collected while generating one unit.
use std::fmt;

use colored::Colorize;
use serde::Serialize;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticCode {
    /// Schema text is not valid JSON. Fails the unit.
    ParseFailure,
    /// Schema path could not be read. Fails the unit.
    FileNotFound,
    /// Fragment or root name selects nothing. Fails the unit.
    RootNotFound,
    /// Two units share a schema reference. Fails every unit of the group.
    DuplicateReference,
    /// Node matched no shape and was emitted as an opaque value.
    UnsupportedConstruct,
    /// Ref-only union without exactly two references. Fails the unit.
    UnsupportedUnionArity,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::UnsupportedConstruct => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::ParseFailure => "ParseFailure",
            DiagnosticCode::FileNotFound => "FileNotFound",
            DiagnosticCode::RootNotFound => "RootNotFound",
            DiagnosticCode::DuplicateReference => "DuplicateReference",
            DiagnosticCode::UnsupportedConstruct => "UnsupportedConstruct",
            DiagnosticCode::UnsupportedUnionArity => "UnsupportedUnionArity",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// `file#/json/pointer` of the offending fragment.
    pub subject_path: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, subject_path: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            subject_path: subject_path.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// One line for terminals, severity colored.
    pub fn render_human(&self) -> String {
        let label = match self.severity {
            Severity::Warning => "warning".yellow().bold(),
            Severity::Error => "error".red().bold(),
        };
        format!(
            "{label}[{}]: {}\n  {} {}",
            self.code,
            self.message,
            "-->".blue().bold(),
            self.subject_path
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity}[{}] {}: {}", self.code, self.subject_path, self.message)
    }
}

/// Append-only diagnostic sink for one generation unit.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(code = %diagnostic.code, subject = %diagnostic.subject_path, "{}", diagnostic.message),
            Severity::Error => tracing::debug!(code = %diagnostic.code, subject = %diagnostic.subject_path, "{}", diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    pub fn report(&mut self, code: DiagnosticCode, message: impl Into<String>, subject_path: impl Into<String>) {
        self.push(Diagnostic::new(code, message, subject_path));
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
