//! Position-anchored validation diagnostics.

use serde::{Deserialize, Serialize};

use crate::event::Location;

/// Severity of a diagnostic.
///
/// Only `Error` and `Fatal` diagnostics make a document invalid. `Fatal` is
/// reserved for internal-contract violations (a malformed event stream), which
/// fail the document closed without aborting other documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn is_invalidating(self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

/// A single validation finding. Produced, never mutated; appended to the
/// verifier's ordered sequence for the document's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
        }
    }

    /// Grammar-mismatch finding from the derivative automaton.
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, location, message)
    }

    /// Assertion `report` finding.
    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, location, message)
    }

    /// Internal-contract violation. The event stream itself was malformed.
    pub fn fatal(location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, location, message)
    }
}
