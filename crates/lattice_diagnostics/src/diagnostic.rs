//! Structured diagnostic messages with severity, codes, and source locations.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A position within a source file.
///
/// Line and column are 1-based. A missing location means the diagnostic
/// applies to the file (or the build) as a whole.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl SourceLocation {
    /// Creates a new source location.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A structured diagnostic message reported against a build.
///
/// Diagnostics are serializable because they travel in worker responses
/// and in archived build results. Each diagnostic includes:
/// - A severity level and unique code
/// - A short header and the main message
/// - An optional file path and position
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// A short header summarizing the problem (e.g. "Invalid Component Tag").
    pub header: String,
    /// The main diagnostic message.
    pub message: String,
    /// The absolute path of the file the diagnostic applies to, if any.
    pub file_path: Option<String>,
    /// The position within the file, if known.
    pub location: Option<SourceLocation>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code, header, and message.
    pub fn error(code: DiagnosticCode, header: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            header: header.into(),
            message: message.into(),
            file_path: None,
            location: None,
            notes: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic with the given code, header, and message.
    pub fn warning(
        code: DiagnosticCode,
        header: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            header: header.into(),
            message: message.into(),
            file_path: None,
            location: None,
            notes: Vec::new(),
        }
    }

    /// Attaches a file path to this diagnostic.
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Attaches a source position to this diagnostic.
    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.location = Some(SourceLocation::new(line, column));
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Sorts diagnostics by file path, then position, then severity.
///
/// Diagnostics without a file sort before all file-scoped ones, and
/// diagnostics without a location sort before located ones in the same
/// file. This is the order build results report to the user.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        (a.file_path.as_deref(), a.location, std::cmp::Reverse(a.severity))
            .cmp(&(b.file_path.as_deref(), b.location, std::cmp::Reverse(b.severity)))
    });
}
