//! HTTP surface: the PDF generation endpoint and a liveness probe.

mod error;
mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use markpress_api_types::GENERATE_PDF_PATH;

use crate::application::conversion::ConversionService;

pub use error::ApiError;
pub use middleware::RequestContext;

pub const HEALTH_PATH: &str = "/healthz";

#[derive(Clone)]
pub struct HttpState {
    pub conversions: Arc<ConversionService>,
}

/// Build the service router. `body_limit` caps request bodies in bytes.
pub fn build_router(state: HttpState, body_limit: usize) -> Router {
    Router::new()
        .route(GENERATE_PDF_PATH, post(handlers::generate_pdf))
        .route(HEALTH_PATH, get(handlers::healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
