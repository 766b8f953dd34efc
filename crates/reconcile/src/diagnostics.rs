//! Structured diagnostics handed back to the host with every outcome.

use std::fmt;

use p1authz_core::{Error, ErrorKind};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub summary: String,
    pub detail: String,
    /// Operation label of the API call involved, e.g. `GetRule-Update`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            summary: summary.into(),
            detail: detail.into(),
            operation: None,
        }
    }

    pub fn warning(kind: ErrorKind, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, summary, detail)
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

impl From<&Error> for Diagnostic {
    fn from(e: &Error) -> Self {
        let summary = match e.kind() {
            ErrorKind::UnexpectedImportIdentifier => "Unexpected Import Identifier",
            ErrorKind::ConstraintViolation => "Invalid Attribute Value",
            ErrorKind::UnsupportedVariant => "Unsupported Variant",
            _ => "Data object conversion error",
        };
        Diagnostic::error(e.kind(), summary, e.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", label, self.kind, self.summary)?;
        if let Some(op) = &self.operation {
            write!(f, " ({})", op)?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n  {}", self.detail)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Diagnostic) {
        match d.severity {
            Severity::Error => tracing::debug!(kind = %d.kind, summary = %d.summary, "error diagnostic"),
            Severity::Warning => tracing::warn!(kind = %d.kind, summary = %d.summary, "{}", d.detail),
        }
        self.0.push(d);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        for d in other.0 {
            self.push(d);
        }
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    /// First error-severity diagnostic, if any.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.0.iter().find(|d| d.severity == Severity::Error)
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|d| d.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(d: Diagnostic) -> Self {
        let mut out = Diagnostics::new();
        out.push(d);
        out
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut d = Diagnostics::new();
        d.push(Diagnostic::warning(ErrorKind::DeleteNotConfirmed, "slow", ""));
        assert!(!d.has_error());
        d.push(Diagnostic::error(ErrorKind::VersionConflict, "409", ""));
        assert!(d.has_error());
        assert_eq!(d.first_error().map(|e| e.kind), Some(ErrorKind::VersionConflict));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn codec_errors_keep_their_kind() {
        let e = Error::UnsupportedVariant {
            family: "Condition".to_string(),
            tag: "XOR".to_string(),
        };
        let d = Diagnostic::from(&e);
        assert_eq!(d.kind, ErrorKind::UnsupportedVariant);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.detail, "Condition: server returned unsupported variant 'XOR'");
    }

    #[test]
    fn display_includes_operation_and_detail() {
        let d = Diagnostic::error(ErrorKind::Api, "Error when calling `CreateRule`", "bad name")
            .with_operation("CreateRule");
        assert_eq!(
            d.to_string(),
            "error[Api]: Error when calling `CreateRule` (CreateRule)\n  bad name"
        );
    }

    #[test]
    fn serializes_as_a_plain_list() {
        let d: Diagnostics =
            Diagnostic::warning(ErrorKind::ResourceNotFoundOnOther, "gone", "x").into();
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            json!([{
                "severity": "warning",
                "kind": "ResourceNotFoundOnOther",
                "summary": "gone",
                "detail": "x"
            }])
        );
    }
}
