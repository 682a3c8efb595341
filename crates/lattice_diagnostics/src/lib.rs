//! Structured diagnostics for the Lattice compiler.
//!
//! Diagnostics are the only channel for reporting user-facing problems:
//! malformed component declarations, unparseable styles, failed disk
//! writes. They are accumulated per build and never thrown as
//! control-flow errors across subsystem boundaries.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{sort_diagnostics, Diagnostic, SourceLocation};
pub use severity::Severity;
pub use sink::DiagnosticSink;
