use std::fmt;

use thiserror::Error;

/// A single rejected configuration field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    pub expected: String,
}

impl FieldError {
    pub fn new(field: &'static str, value: impl fmt::Display, expected: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} (expected {})", self.field, self.value, self.expected)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("invalid configuration: {}", join_fields(.0))]
    InvalidConfiguration(Vec<FieldError>),
    #[error("analyzer has been disposed")]
    Disposed,
}

impl AnalyzerError {
    /// Names of the rejected fields, empty for non-configuration errors.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        match self {
            AnalyzerError::InvalidConfiguration(fields) => fields.iter().map(|f| f.field).collect(),
            AnalyzerError::Disposed => Vec::new(),
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures reported by a signal source. The sampler recovers from all of
/// them by switching to synthetic data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("failed to connect signal source: {0}")]
    Connection(String),
    #[error("signal source is not ready")]
    NotReady,
    #[error("failed to read spectrum: {0}")]
    Read(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_configuration_lists_every_field() {
        let err = AnalyzerError::InvalidConfiguration(vec![
            FieldError::new("fft_size", 100, "power of two in [32, 32768]"),
            FieldError::new("smoothing", 1.5, "[0, 1]"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("fft_size=100"));
        assert!(msg.contains("smoothing=1.5"));
        assert_eq!(err.invalid_fields(), vec!["fft_size", "smoothing"]);
    }

    #[test]
    fn disposed_has_no_fields() {
        assert!(AnalyzerError::Disposed.invalid_fields().is_empty());
    }
}
