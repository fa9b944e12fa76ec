use std::fmt;

use thiserror::Error;

/// Machine-readable reason attached to a rejected request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCode {
    Required,
    Empty,
    InvalidFilename,
    TooLong,
    InvalidBody,
}

impl ViolationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationCode::Required => "required",
            ViolationCode::Empty => "empty",
            ViolationCode::InvalidFilename => "invalid_filename",
            ViolationCode::TooLong => "too_long",
            ViolationCode::InvalidBody => "invalid_body",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub code: ViolationCode,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

/// Every field failure found while validating one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request: {}", summarize(.violations))]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn single(field: &'static str, code: ViolationCode, message: impl Into<String>) -> Self {
        Self::new(vec![FieldViolation::new(field, code, message)])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} ({}): {}", v.field, v.code, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}
