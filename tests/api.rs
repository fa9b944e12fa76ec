mod support;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use markpress_api_types::{
    GENERATE_PDF_PATH, GENERATION_FAILED_MESSAGE, GeneratePdfRequest, GenerationFailureBody,
    INVALID_REQUEST_MESSAGE, ValidationErrorBody,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use support::{FAKE_PDF, FakeEngine, Faults, router, router_with_limit};

async fn post_raw(app: Router, content_type: Option<&str>, body: impl Into<Body>) -> Response {
    let mut builder = Request::builder().method(Method::POST).uri(GENERATE_PDF_PATH);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    app.oneshot(builder.body(body.into()).expect("request"))
        .await
        .expect("router is infallible")
}

async fn post_json(app: Router, request: &GeneratePdfRequest) -> Response {
    let body = serde_json::to_vec(request).expect("serialize request");
    post_raw(app, Some("application/json"), body).await
}

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn valid_request_streams_pdf_attachment() {
    let engine = FakeEngine::new();
    let response = post_json(
        router(&engine),
        &GeneratePdfRequest::new("# Hello\n\nWorld", "doc.pdf"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[CONTENT_TYPE], "application/pdf");
    assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"doc.pdf\"");
    assert_eq!(headers[CONTENT_LENGTH], FAKE_PDF.len().to_string().as_str());

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert!(body.starts_with(b"%PDF-"));
    assert_eq!(body.len(), FAKE_PDF.len());

    assert_eq!(engine.launches(), 1);
    assert_eq!(engine.closes(), 1);
    assert_eq!(engine.live(), 0);
}

#[tokio::test]
async fn empty_markdown_is_rejected_without_launching() {
    let engine = FakeEngine::new();
    let response = post_json(router(&engine), &GeneratePdfRequest::new("", "x.pdf")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ValidationErrorBody = read_json(response).await;
    assert_eq!(body.message, INVALID_REQUEST_MESSAGE);
    assert_eq!(body.errors.len(), 1);
    assert_eq!(body.errors[0].field, "markdown");
    assert_eq!(body.errors[0].code, "empty");

    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn whitespace_markdown_and_bad_filename_are_reported_together() {
    let engine = FakeEngine::new();
    let response = post_json(
        router(&engine),
        &GeneratePdfRequest::new(" \n\t ", "../etc/passwd"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ValidationErrorBody = read_json(response).await;
    let fields: Vec<(&str, &str)> = body
        .errors
        .iter()
        .map(|error| (error.field.as_str(), error.code.as_str()))
        .collect();
    assert_eq!(
        fields,
        [("markdown", "empty"), ("filename", "invalid_filename")]
    );
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn missing_fields_are_required() {
    let engine = FakeEngine::new();
    let response = post_raw(router(&engine), Some("application/json"), "{}").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ValidationErrorBody = read_json(response).await;
    assert!(body.errors.iter().all(|error| error.code == "required"));
    assert_eq!(body.errors.len(), 2);
}

#[tokio::test]
async fn malformed_json_is_a_body_violation() {
    let engine = FakeEngine::new();

    for (content_type, payload) in [
        (Some("application/json"), "{not json"),
        (Some("application/json"), r#"{"markdown": 7, "filename": "a.pdf"}"#),
        (None, r##"{"markdown": "# x", "filename": "a.pdf"}"##),
    ] {
        let response = post_raw(router(&engine), content_type, payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");

        let body: ValidationErrorBody = read_json(response).await;
        assert_eq!(body.errors[0].field, "body");
        assert_eq!(body.errors[0].code, "invalid_body");
    }
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let engine = FakeEngine::new();
    let markdown = "a".repeat(4096);
    let body = serde_json::to_vec(&GeneratePdfRequest::new(markdown, "big.pdf")).expect("json");

    let response = post_raw(router_with_limit(&engine, 1024), Some("application/json"), body).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(engine.launches(), 0);
}

#[tokio::test]
async fn launch_failure_is_500_and_service_recovers() {
    let engine = FakeEngine::with_faults(Faults {
        fail_launch: true,
        ..Faults::default()
    });
    let app = router(&engine);

    let response = post_json(app.clone(), &GeneratePdfRequest::new("# Hi", "doc.pdf")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: GenerationFailureBody = read_json(response).await;
    assert_eq!(body.message, GENERATION_FAILED_MESSAGE);
    assert!(body.error.contains("launch"), "{}", body.error);

    engine.set_faults(Faults::default());
    let response = post_json(app, &GeneratePdfRequest::new("# Hi", "doc.pdf")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(engine.live(), 0);
}

#[tokio::test]
async fn capture_failure_is_500_and_session_is_torn_down() {
    let engine = FakeEngine::new();
    let response = post_json(
        router(&engine),
        &GeneratePdfRequest::new("FAIL-CAPTURE", "doc.pdf"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: GenerationFailureBody = read_json(response).await;
    assert!(body.error.contains("capture"), "{}", body.error);
    assert_eq!(engine.closes(), 1);
    assert_eq!(engine.live(), 0);
}

#[tokio::test]
async fn non_ascii_filename_is_preserved() {
    let engine = FakeEngine::new();
    let response = post_json(
        router(&engine),
        &GeneratePdfRequest::new("# 你好", "报告.pdf"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[CONTENT_DISPOSITION].as_bytes();
    assert_eq!(disposition, "attachment; filename=\"报告.pdf\"".as_bytes());
}

#[tokio::test]
async fn healthz_reports_no_content() {
    let engine = FakeEngine::new();
    let response = router(&engine)
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router is infallible");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(engine.launches(), 0);
}
