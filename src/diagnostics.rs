//! User-facing diagnostics raised while planning.
//!
//! Conditions a user can fix (a missing entry-point file, a redundant flag)
//! are reported through a [`DiagnosticSink`] and planning carries on. Broken
//! invariants are not diagnostics; they surface as [`crate::error::PlanError`].
//!
//! # Examples
//!
//! ```
//! use buildplan::diagnostics::{DiagnosticLog, DiagnosticSink, Severity};
//!
//! let mut log = DiagnosticLog::default();
//! log.warning("flag is deprecated");
//! assert!(!log.has_errors());
//! assert_eq!(log.diagnostics()[0].severity, Severity::Warning);
//! ```

use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use tracing::{error, warn};

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Planning proceeds and the output is as requested.
    Warning,
    /// Part of the requested output could not be planned.
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// How serious the condition is.
    pub severity: Severity,
    /// Free-text body.
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}: {}", self.message)
    }
}

/// Receives diagnostics as they are raised.
pub trait DiagnosticSink {
    /// Record one diagnostic.
    fn emit(&mut self, diagnostic: Diagnostic);

    /// Record a warning.
    fn warning(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    /// Record an error.
    fn error(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
        });
    }
}

/// Collects diagnostics in order and mirrors each one to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticLog {
    /// Diagnostics recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Messages of the given severity.
    pub fn messages(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
            .map(|d| d.message.as_str())
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!(message = %diagnostic.message, "planning warning"),
            Severity::Error => error!(message = %diagnostic.message, "planning error"),
        }
        self.diagnostics.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, diagnostic: Diagnostic) {
        (**self).emit(diagnostic);
    }
}
