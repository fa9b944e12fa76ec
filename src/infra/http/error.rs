use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use markpress_api_types::{FieldError, GenerationFailureBody, ValidationErrorBody};

use crate::{
    application::{conversion::ConversionError, error::ErrorReport},
    domain::{
        error::{ValidationErrors, ViolationCode},
        request::BODY_FIELD,
    },
};

const SOURCE: &str = "infra::http::generate_pdf";

/// Failure of the PDF generation endpoint, rendered as the public JSON shapes.
#[derive(Debug)]
pub enum ApiError {
    Invalid(ValidationErrors),
    Rejected(JsonRejection),
    Failed(ConversionError),
}

impl From<ConversionError> for ApiError {
    fn from(error: ConversionError) -> Self {
        match error {
            ConversionError::Validation(errors) => ApiError::Invalid(errors),
            other => ApiError::Failed(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => invalid_response(&errors),
            ApiError::Rejected(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                let report = ErrorReport::from_error(SOURCE, rejection.status(), &rejection);
                let mut response = rejection.into_response();
                report.attach(&mut response);
                response
            }
            ApiError::Rejected(rejection) => {
                let errors = ValidationErrors::single(
                    BODY_FIELD,
                    ViolationCode::InvalidBody,
                    rejection.body_text(),
                );
                invalid_response(&errors)
            }
            ApiError::Failed(error) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = GenerationFailureBody::new(error.to_string());
                let mut response = (status, Json(body)).into_response();
                ErrorReport::from_error(SOURCE, status, &error).attach(&mut response);
                response
            }
        }
    }
}

fn invalid_response(errors: &ValidationErrors) -> Response {
    let status = StatusCode::BAD_REQUEST;
    let body = ValidationErrorBody::new(
        errors
            .violations()
            .iter()
            .map(|violation| FieldError {
                field: violation.field.to_string(),
                code: violation.code.as_str().to_string(),
                message: violation.message.clone(),
            })
            .collect(),
    );
    let mut response = (status, Json(body)).into_response();
    ErrorReport::from_error(SOURCE, status, errors).attach(&mut response);
    response
}
