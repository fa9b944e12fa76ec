#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use markpress::{
    application::{
        conversion::ConversionService,
        engine::{FontReadiness, RenderEngine, RenderEngineError, RenderSession, RenderTimeouts},
        limiter::RenderLimiter,
        template::DocumentTemplater,
    },
    domain::document::{CaptureOptions, RenderedDocument},
    infra::http::{HttpState, build_router},
};

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// Markers that make a session fail when they appear in the rendered document.
pub const FAIL_LOAD_MARKER: &str = "FAIL-LOAD";
pub const FAIL_CAPTURE_MARKER: &str = "FAIL-CAPTURE";

#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_launch: bool,
    pub hang_launch: bool,
    pub hang_fonts: bool,
    pub fail_fonts: bool,
    pub hang_capture: bool,
    /// Time each capture takes, to keep sessions alive concurrently.
    pub capture_delay: Option<Duration>,
}

#[derive(Default)]
struct EngineState {
    faults: Mutex<Faults>,
    launches: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
    closes: AtomicUsize,
    captures: AtomicUsize,
}

/// In-process stand-in for a browser: counts sessions and injects failures.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let engine = Self::default();
        engine.set_faults(faults);
        engine
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.state.faults.lock().expect("faults lock") = faults;
    }

    fn faults(&self) -> Faults {
        self.state.faults.lock().expect("faults lock").clone()
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Sessions launched and not yet closed or dropped.
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.state.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderEngineError> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults();

        if faults.fail_launch {
            return Err(RenderEngineError::launch("injected launch failure"));
        }
        if faults.hang_launch {
            std::future::pending::<()>().await;
        }

        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            faults,
            document: None,
        }))
    }
}

struct FakeSession {
    state: Arc<EngineState>,
    faults: Faults,
    document: Option<RenderedDocument>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn load_content(&mut self, document: &RenderedDocument) -> Result<(), RenderEngineError> {
        if document.body().contains(FAIL_LOAD_MARKER) {
            return Err(RenderEngineError::load("injected load failure"));
        }
        self.document = Some(document.clone());
        Ok(())
    }

    async fn await_ready(&mut self, _budget: Duration) -> Result<FontReadiness, RenderEngineError> {
        if self.faults.hang_fonts {
            std::future::pending::<()>().await;
        }
        if self.faults.fail_fonts {
            return Err(RenderEngineError::internal("injected font script failure"));
        }
        Ok(FontReadiness::Loaded)
    }

    async fn capture_pdf(&mut self, _options: &CaptureOptions) -> Result<Vec<u8>, RenderEngineError> {
        if let Some(delay) = self.faults.capture_delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.hang_capture {
            std::future::pending::<()>().await;
        }
        let failing = self
            .document
            .as_ref()
            .is_some_and(|doc| doc.body().contains(FAIL_CAPTURE_MARKER));
        if failing {
            return Err(RenderEngineError::capture("injected capture failure"));
        }
        self.state.captures.fetch_add(1, Ordering::SeqCst);
        Ok(FAKE_PDF.to_vec())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderEngineError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn short_timeouts() -> RenderTimeouts {
    RenderTimeouts {
        launch: Duration::from_secs(2),
        load: Duration::from_secs(2),
        fonts: Duration::from_millis(200),
        capture: Duration::from_secs(2),
    }
}

pub fn service(engine: &FakeEngine) -> ConversionService {
    ConversionService::new(
        Arc::new(engine.clone()),
        DocumentTemplater::offline(),
        short_timeouts(),
    )
}

pub fn limited_service(engine: &FakeEngine, limiter: RenderLimiter) -> ConversionService {
    service(engine).with_limiter(limiter)
}

pub fn router(engine: &FakeEngine) -> Router {
    router_with_limit(engine, 2 * 1024 * 1024)
}

pub fn router_with_limit(engine: &FakeEngine, body_limit: usize) -> Router {
    build_router(
        HttpState {
            conversions: Arc::new(service(engine)),
        },
        body_limit,
    )
}
