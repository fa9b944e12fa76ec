//! Conversion requests: raw input as received, and the validated form the
//! pipeline works with.

use std::path::Path;

use super::error::{FieldViolation, ValidationErrors, ViolationCode};

pub const MARKDOWN_FIELD: &str = "markdown";
pub const FILENAME_FIELD: &str = "filename";
/// Pseudo-field used when the request body as a whole is unusable.
pub const BODY_FIELD: &str = "body";

/// Longest accepted download filename, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Unvalidated conversion input, straight from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionDraft {
    pub markdown: Option<String>,
    pub filename: Option<String>,
}

impl ConversionDraft {
    pub fn new(markdown: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            filename: Some(filename.into()),
        }
    }

    /// Validate every field, reporting all failures together.
    pub fn validate(self) -> Result<ConversionRequest, ValidationErrors> {
        let mut violations = Vec::new();

        let markdown = match self.markdown {
            None => {
                violations.push(FieldViolation::new(
                    MARKDOWN_FIELD,
                    ViolationCode::Required,
                    "Markdown content is required",
                ));
                None
            }
            Some(markdown) if markdown.trim().is_empty() => {
                violations.push(FieldViolation::new(
                    MARKDOWN_FIELD,
                    ViolationCode::Empty,
                    "Markdown content must not be empty",
                ));
                None
            }
            Some(markdown) => Some(markdown),
        };

        let filename = match self.filename {
            None => {
                violations.push(FieldViolation::new(
                    FILENAME_FIELD,
                    ViolationCode::Required,
                    "Filename is required",
                ));
                None
            }
            Some(filename) => match check_filename(filename.trim()) {
                Ok(()) => Some(filename.trim().to_string()),
                Err(violation) => {
                    violations.push(violation);
                    None
                }
            },
        };

        match (markdown, filename) {
            (Some(markdown), Some(filename)) if violations.is_empty() => {
                Ok(ConversionRequest { markdown, filename })
            }
            _ => Err(ValidationErrors::new(violations)),
        }
    }
}

/// A conversion request that passed validation.
///
/// `markdown` is non-empty after trimming and `filename` is a bare, header-safe
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    markdown: String,
    filename: String,
}

impl ConversionRequest {
    pub fn new(
        markdown: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self, ValidationErrors> {
        ConversionDraft::new(markdown, filename).validate()
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Document title derived from the filename without its extension.
    pub fn title(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.filename)
    }
}

fn check_filename(filename: &str) -> Result<(), FieldViolation> {
    if filename.is_empty() {
        return Err(FieldViolation::new(
            FILENAME_FIELD,
            ViolationCode::Empty,
            "Filename must not be empty",
        ));
    }

    if filename.len() > MAX_FILENAME_BYTES {
        return Err(FieldViolation::new(
            FILENAME_FIELD,
            ViolationCode::TooLong,
            format!("Filename must be at most {MAX_FILENAME_BYTES} bytes"),
        ));
    }

    if filename == "." || filename == ".." {
        return Err(FieldViolation::new(
            FILENAME_FIELD,
            ViolationCode::InvalidFilename,
            "Filename must name a file",
        ));
    }

    // Quotes would break out of the Content-Disposition parameter.
    if let Some(bad) = filename
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '"') || c.is_control())
    {
        return Err(FieldViolation::new(
            FILENAME_FIELD,
            ViolationCode::InvalidFilename,
            format!("Filename must not contain {bad:?}"),
        ));
    }

    Ok(())
}
