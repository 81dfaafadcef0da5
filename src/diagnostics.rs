use std::fmt;

use serde::{Deserialize, Serialize};

/// A half-open region of the source document, in byte offsets.
///
/// Upstream layers that do not track source positions simply leave regions
/// absent; diagnostics then render without a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub begin: usize,
    pub end: usize,
}

impl Region {
    pub fn new(begin: usize, end: usize) -> Self {
        Region { begin, end }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin, self.end)
    }
}

/// Codes of semantic diagnostics produced during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    Unknown,
    UnresolvedVariable,
    InconsistentType,
    InconsistentElements,
    AmbiguousType,
    UnsupportedType,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCode::Unknown => f.write_str("unknown"),
            DiagnosticCode::UnresolvedVariable => f.write_str("unresolved_variable"),
            DiagnosticCode::InconsistentType => f.write_str("inconsistent_type"),
            DiagnosticCode::InconsistentElements => f.write_str("inconsistent_elements"),
            DiagnosticCode::AmbiguousType => f.write_str("ambiguous_type"),
            DiagnosticCode::UnsupportedType => f.write_str("unsupported_type"),
        }
    }
}

/// A single semantic problem found during resolution.
///
/// Diagnostics are accumulated; resolution keeps going so one pass can
/// surface every independent mistake in the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub region: Option<Region>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, region: Option<Region>) -> Self {
        Diagnostic {
            code,
            message: message.into(),
            region,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}: {} ({})", self.code, self.message, region),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
