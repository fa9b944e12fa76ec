use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use markpress_api_types::GeneratePdfRequest;
use tracing::error;

use crate::{application::conversion::PdfDownload, domain::request::ConversionDraft};

use super::{HttpState, error::ApiError};

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub(super) async fn generate_pdf(
    State(state): State<HttpState>,
    payload: Result<Json<GeneratePdfRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let draft = ConversionDraft {
        markdown: body.markdown,
        filename: body.filename,
    };

    let download = state.conversions.convert(draft).await?;
    Ok(pdf_response(download))
}

pub(super) async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn pdf_response(download: PdfDownload) -> Response {
    let PdfDownload { filename, artifact } = download;
    let length = artifact.byte_len();

    let mut response = Response::new(Body::from(artifact.into_bytes()));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

    // Validation already excludes quotes and control characters, so the name
    // can be quoted as-is; non-ASCII names travel as raw UTF-8.
    let disposition = format!("attachment; filename=\"{filename}\"");
    match HeaderValue::from_bytes(disposition.as_bytes()) {
        Ok(value) => {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        Err(err) => {
            error!(
                target = "markpress::http::response",
                filename = %filename,
                error = %err,
                "failed to encode content-disposition header"
            );
            headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
        }
    }

    response.into_response()
}
