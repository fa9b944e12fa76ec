//! Wire types for the markpress HTTP API.
//!
//! These types are shared by the server and by clients that want to call
//! `POST /api/generate-pdf` without re-declaring the JSON shapes.

use serde::{Deserialize, Serialize};

/// Path of the PDF generation endpoint.
pub const GENERATE_PDF_PATH: &str = "/api/generate-pdf";

/// Top-level message used for every validation failure.
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request data";

/// Top-level message used for every non-validation failure.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate PDF";

/// Request body accepted by the PDF generation endpoint.
///
/// Both fields are optional at the wire level so that a missing field is
/// reported as a field-level validation error instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl GeneratePdfRequest {
    pub fn new(markdown: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            filename: Some(filename.into()),
        }
    }
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Body returned with `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorBody {
    pub message: String,
    pub errors: Vec<FieldError>,
}

impl ValidationErrorBody {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self {
            message: INVALID_REQUEST_MESSAGE.to_string(),
            errors,
        }
    }
}

/// Body returned with `500 Internal Server Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailureBody {
    pub message: String,
    pub error: String,
}

impl GenerationFailureBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            message: GENERATION_FAILED_MESSAGE.to_string(),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_as_none() {
        let body: GeneratePdfRequest =
            serde_json::from_str(r##"{"markdown":"# Title"}"##).expect("valid json");
        assert_eq!(body.markdown.as_deref(), Some("# Title"));
        assert!(body.filename.is_none());
    }

    #[test]
    fn validation_body_uses_fixed_message() {
        let body = ValidationErrorBody::new(vec![FieldError {
            field: "markdown".to_string(),
            code: "empty".to_string(),
            message: "Markdown content is required".to_string(),
        }]);
        let json = serde_json::to_value(&body).expect("serialize");

        assert_eq!(json["message"], INVALID_REQUEST_MESSAGE);
        assert_eq!(json["errors"][0]["field"], "markdown");
    }
}
