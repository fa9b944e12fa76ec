//! Orchestrates one Markdown to PDF conversion.
//!
//! Stages run strictly in sequence: validate, transform, template, render.
//! Nothing is cached between calls; the only state shared across conversions
//! is the optional [`RenderLimiter`].

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    application::{
        engine::{RenderController, RenderEngine, RenderEngineError, RenderTimeouts},
        limiter::RenderLimiter,
        markdown::{MarkdownTransformer, markdown_transformer},
        template::{DocumentTemplater, TemplateError},
    },
    domain::{
        document::{Margins, PageFormat, PdfArtifact},
        error::ValidationErrors,
        request::{ConversionDraft, ConversionRequest},
    },
};

pub(crate) const METRIC_CONVERSIONS: &str = "markpress_conversions_total";
pub(crate) const METRIC_RENDER_MS: &str = "markpress_render_ms";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Render(#[from] RenderEngineError),
}

impl ConversionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::Validation(_) => "validation",
            ConversionError::Template(_) => "template",
            ConversionError::Render(err) => err.kind(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ConversionError::Validation(_))
    }
}

/// A finished conversion, ready to be streamed to the caller.
#[derive(Debug, Clone)]
pub struct PdfDownload {
    pub filename: String,
    pub artifact: PdfArtifact,
}

pub struct ConversionService {
    transformer: Arc<MarkdownTransformer>,
    templater: DocumentTemplater,
    controller: RenderController,
    limiter: Option<RenderLimiter>,
    page_format: PageFormat,
    margins: Margins,
}

impl ConversionService {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        templater: DocumentTemplater,
        timeouts: RenderTimeouts,
    ) -> Self {
        Self {
            transformer: markdown_transformer(),
            templater,
            controller: RenderController::new(engine, timeouts),
            limiter: None,
            page_format: PageFormat::A4,
            margins: Margins::default(),
        }
    }

    pub fn with_limiter(self, limiter: RenderLimiter) -> Self {
        self.with_limiter_opt(Some(limiter))
    }

    pub fn with_limiter_opt(mut self, limiter: Option<RenderLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Validate `draft` and run it through the full pipeline.
    pub async fn convert(&self, draft: ConversionDraft) -> Result<PdfDownload, ConversionError> {
        let request = match draft.validate() {
            Ok(request) => request,
            Err(err) => {
                counter!(METRIC_CONVERSIONS, "result" => "invalid").increment(1);
                debug!(
                    target = "application::conversion",
                    op = "conversion::validate",
                    result = "invalid",
                    violations = err.violations().len(),
                    "Rejected conversion request"
                );
                return Err(err.into());
            }
        };

        let artifact = self.render_request(&request).await?;
        Ok(PdfDownload {
            filename: request.filename().to_string(),
            artifact,
        })
    }

    /// Run an already validated request through transform, template and render.
    pub async fn render_request(
        &self,
        request: &ConversionRequest,
    ) -> Result<PdfArtifact, ConversionError> {
        let started = Instant::now();
        let result = self.run_pipeline(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(artifact) => {
                counter!(METRIC_CONVERSIONS, "result" => "ok").increment(1);
                histogram!(METRIC_RENDER_MS).record(elapsed_ms as f64);
                info!(
                    target = "application::conversion",
                    op = "conversion::convert",
                    result = "ok",
                    filename = request.filename(),
                    markdown_bytes = request.markdown().len(),
                    pdf_bytes = artifact.byte_len(),
                    elapsed_ms,
                    "Converted Markdown to PDF"
                );
            }
            Err(err) => {
                counter!(METRIC_CONVERSIONS, "result" => "failed").increment(1);
                warn!(
                    target = "application::conversion",
                    op = "conversion::convert",
                    result = "error",
                    filename = request.filename(),
                    error_kind = err.kind(),
                    error = %err,
                    elapsed_ms,
                    "Conversion failed"
                );
            }
        }

        result
    }

    async fn run_pipeline(&self, request: &ConversionRequest) -> Result<PdfArtifact, ConversionError> {
        let fragment = self.transformer.to_html(request.markdown());
        let document = self.templater.wrap_with_title(&fragment, request.title())?;

        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await?),
            None => None,
        };

        let artifact = self
            .controller
            .render(&document, self.page_format, self.margins)
            .await?;
        Ok(artifact)
    }
}
