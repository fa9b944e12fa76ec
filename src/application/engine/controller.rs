use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, gauge};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{FontReadiness, RenderEngine, RenderEngineError, RenderSession, RenderStage, SessionState};
use crate::domain::document::{
    CaptureOptions, Margins, PDF_SIGNATURE, PageFormat, PdfArtifact, RenderedDocument,
};

pub(crate) const METRIC_SESSIONS_ACTIVE: &str = "markpress_render_sessions_active";
pub(crate) const METRIC_FONT_WAIT_TIMEOUTS: &str = "markpress_font_wait_timeouts_total";

/// Slack on top of the in-page font budget so the page's own timer wins.
const FONT_WAIT_GRACE: Duration = Duration::from_millis(250);

/// Upper bounds for each suspension point of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTimeouts {
    pub launch: Duration,
    pub load: Duration,
    /// Exceeding this degrades output instead of failing the render.
    pub fonts: Duration,
    pub capture: Duration,
}

impl Default for RenderTimeouts {
    fn default() -> Self {
        Self {
            launch: Duration::from_secs(30),
            load: Duration::from_secs(30),
            fonts: Duration::from_secs(5),
            capture: Duration::from_secs(60),
        }
    }
}

/// Runs one document through a fresh render session and always tears the
/// session down before returning.
#[derive(Clone)]
pub struct RenderController {
    engine: Arc<dyn RenderEngine>,
    timeouts: RenderTimeouts,
}

impl RenderController {
    pub fn new(engine: Arc<dyn RenderEngine>, timeouts: RenderTimeouts) -> Self {
        Self { engine, timeouts }
    }

    pub async fn render(
        &self,
        document: &RenderedDocument,
        format: PageFormat,
        margins: Margins,
    ) -> Result<PdfArtifact, RenderEngineError> {
        let options = CaptureOptions::new(format, margins);
        let mut lifecycle = Lifecycle::new(self.engine.name());

        lifecycle.advance(SessionState::Launching);
        let mut session = match bounded(
            RenderStage::Launch,
            self.timeouts.launch,
            self.engine.launch(),
        )
        .await
        {
            Ok(session) => session,
            Err(err) => {
                lifecycle.fail(&err);
                return Err(err);
            }
        };
        // Dropping `session` (for example when the caller is cancelled) kills
        // the process; the gauge guard is released on the same path.
        let _active = ActiveSession::enter();

        let outcome = self
            .drive(session.as_mut(), document, &options, &mut lifecycle)
            .await;
        let closed = session.close().await;

        if let Err(err) = &closed {
            warn!(
                target = "application::engine",
                op = "engine::close",
                render_id = %lifecycle.render_id,
                engine = lifecycle.engine,
                error = %err,
                "Render session reported a teardown failure"
            );
        }

        match outcome {
            Ok(bytes) => {
                lifecycle.advance(SessionState::Closed);
                info!(
                    target = "application::engine",
                    op = "engine::render",
                    result = "ok",
                    render_id = %lifecycle.render_id,
                    engine = lifecycle.engine,
                    elapsed_ms = lifecycle.elapsed_ms(),
                    pdf_bytes = bytes.len(),
                    "PDF captured"
                );
                Ok(PdfArtifact::new(bytes))
            }
            Err(err) => {
                lifecycle.fail(&err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn RenderSession,
        document: &RenderedDocument,
        options: &CaptureOptions,
        lifecycle: &mut Lifecycle,
    ) -> Result<Vec<u8>, RenderEngineError> {
        lifecycle.advance(SessionState::PageLoading);
        bounded(
            RenderStage::Load,
            self.timeouts.load,
            session.load_content(document),
        )
        .await?;

        lifecycle.advance(SessionState::AwaitingFonts);
        self.wait_for_fonts(session, lifecycle).await;

        lifecycle.advance(SessionState::Capturing);
        let bytes = bounded(
            RenderStage::Capture,
            self.timeouts.capture,
            session.capture_pdf(options),
        )
        .await?;

        if bytes.is_empty() {
            return Err(RenderEngineError::capture("engine returned an empty document"));
        }
        if !bytes.starts_with(PDF_SIGNATURE) {
            return Err(RenderEngineError::capture(
                "engine output does not start with a PDF signature",
            ));
        }
        Ok(bytes)
    }

    async fn wait_for_fonts(&self, session: &mut dyn RenderSession, lifecycle: &Lifecycle) {
        let budget = self.timeouts.fonts;

        match timeout(budget + FONT_WAIT_GRACE, session.await_ready(budget)).await {
            Ok(Ok(FontReadiness::Loaded)) => {
                debug!(
                    target = "application::engine",
                    render_id = %lifecycle.render_id,
                    "Fonts ready"
                );
            }
            Ok(Ok(FontReadiness::Degraded)) | Err(_) => {
                counter!(METRIC_FONT_WAIT_TIMEOUTS).increment(1);
                warn!(
                    target = "application::engine",
                    op = "engine::await_ready",
                    result = "degraded",
                    render_id = %lifecycle.render_id,
                    budget_ms = budget.as_millis() as u64,
                    "Fonts not ready in time; capturing with available fonts"
                );
            }
            Ok(Err(err)) => {
                counter!(METRIC_FONT_WAIT_TIMEOUTS).increment(1);
                warn!(
                    target = "application::engine",
                    op = "engine::await_ready",
                    result = "degraded",
                    render_id = %lifecycle.render_id,
                    error = %err,
                    "Font readiness check failed; capturing with available fonts"
                );
            }
        }
    }
}

async fn bounded<T, F>(stage: RenderStage, limit: Duration, future: F) -> Result<T, RenderEngineError>
where
    F: Future<Output = Result<T, RenderEngineError>>,
{
    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(RenderEngineError::timeout(stage, limit)),
    }
}

/// Tracks the live-session gauge for exactly as long as a session exists.
struct ActiveSession;

impl ActiveSession {
    fn enter() -> Self {
        gauge!(METRIC_SESSIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        gauge!(METRIC_SESSIONS_ACTIVE).decrement(1.0);
    }
}

pub(crate) struct Lifecycle {
    render_id: Uuid,
    engine: &'static str,
    state: SessionState,
    started_at: Instant,
    entered_at: Instant,
}

impl Lifecycle {
    pub(crate) fn new(engine: &'static str) -> Self {
        let now = Instant::now();
        Self {
            render_id: Uuid::new_v4(),
            engine,
            state: SessionState::Idle,
            started_at: now,
            entered_at: now,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal render transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(
            target = "application::engine",
            render_id = %self.render_id,
            engine = self.engine,
            from = self.state.as_str(),
            to = next.as_str(),
            stage_elapsed_ms = self.entered_at.elapsed().as_millis() as u64,
            "Render session transition"
        );
        self.state = next;
        self.entered_at = Instant::now();
    }

    pub(crate) fn fail(&mut self, error: &RenderEngineError) {
        warn!(
            target = "application::engine",
            op = "engine::render",
            result = "error",
            render_id = %self.render_id,
            engine = self.engine,
            state = self.state.as_str(),
            error_kind = error.kind(),
            elapsed_ms = self.elapsed_ms(),
            error = %error,
            "Render session failed"
        );
        self.state = SessionState::Failed;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
