//! Headless Chrome render engine.
//!
//! Every session launches its own browser with a throwaway profile. The
//! `headless_chrome` API is blocking, so each call runs on the blocking pool
//! and the session keeps the [`Browser`] handle whose drop kills the process.

use std::{
    ffi::OsStr,
    io::Write,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab, types::PrintToPdfOptions};
use tempfile::NamedTempFile;
use tokio::{runtime::Handle, task};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    application::engine::{FontReadiness, RenderEngine, RenderEngineError, RenderSession},
    domain::document::{CaptureOptions, RenderedDocument},
};

/// Chromium switches for a short-lived, single-document renderer.
const BASE_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--disable-gpu",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

const UNSANDBOXED_ARGS: &[&str] = &["--disable-setuid-sandbox"];

/// Added to the load budget so the caller's deadline fires before the tab's own.
const TAB_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Resolves to `"loaded"` once every font settled, or `"timeout"` when the
/// in-page timer fires first.
const FONT_READY_SCRIPT: &str = r#"
Promise.race([
    document.fonts.ready.then(() => document.fonts.status),
    new Promise((resolve) => setTimeout(() => resolve("timeout"), __BUDGET__)),
])
"#;

#[derive(Debug, Clone)]
pub struct ChromeEngineConfig {
    /// Browser executable; discovered from the environment when `None`.
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
    /// How long an unattended browser may stay idle before the driver gives up on it.
    pub idle_timeout: Duration,
    /// Navigation budget granted by the caller.
    pub load_timeout: Duration,
}

impl ChromeEngineConfig {
    /// Wait limit for blocking tab calls. The driver defaults to 20s, which
    /// would cut a longer load budget short.
    pub fn tab_timeout(&self) -> Duration {
        self.load_timeout + TAB_TIMEOUT_GRACE
    }
}

impl Default for ChromeEngineConfig {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: false,
            idle_timeout: Duration::from_secs(120),
            load_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromeEngine {
    config: ChromeEngineConfig,
}

impl ChromeEngine {
    pub fn new(config: ChromeEngineConfig) -> Self {
        Self { config }
    }

    fn launch_blocking(config: &ChromeEngineConfig) -> Result<ChromeSession, RenderEngineError> {
        let mut args: Vec<&OsStr> = BASE_ARGS.iter().map(OsStr::new).collect();
        if !config.sandbox {
            args.extend(UNSANDBOXED_ARGS.iter().map(OsStr::new));
        }

        let options = LaunchOptions {
            headless: true,
            sandbox: config.sandbox,
            path: config.executable.clone(),
            args,
            idle_browser_timeout: config.idle_timeout,
            ..LaunchOptions::default()
        };

        let browser =
            Browser::new(options).map_err(|err| RenderEngineError::launch(err.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|err| RenderEngineError::launch(format!("failed to open page: {err}")))?;
        tab.set_default_timeout(config.tab_timeout());

        Ok(ChromeSession {
            browser: Some(browser),
            tab,
            page: None,
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderEngineError> {
        let config = self.config.clone();
        let started = Instant::now();

        // A cancelled caller drops the join handle; the session built on the
        // blocking thread is then dropped there and its browser killed.
        let session = task::spawn_blocking(move || Self::launch_blocking(&config))
            .await
            .map_err(|err| RenderEngineError::internal(format!("launch task failed: {err}")))??;

        debug!(
            target = "infra::chrome",
            op = "chrome::launch",
            result = "ok",
            elapsed_ms = started.elapsed().as_millis() as u64,
            sandbox = self.config.sandbox,
            "Browser launched"
        );
        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    /// Backing file for the loaded page; removed when the session ends.
    page: Option<NamedTempFile>,
}

impl ChromeSession {
    async fn on_tab<T, F>(&self, op: &'static str, call: F) -> Result<T, RenderEngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, RenderEngineError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        task::spawn_blocking(move || call(&tab))
            .await
            .map_err(|err| RenderEngineError::internal(format!("{op} task failed: {err}")))?
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn load_content(&mut self, document: &RenderedDocument) -> Result<(), RenderEngineError> {
        let html = document.html().to_owned();
        let page = task::spawn_blocking(move || write_page(&html))
            .await
            .map_err(|err| RenderEngineError::internal(format!("page write task failed: {err}")))??;

        let url = Url::from_file_path(page.path()).map_err(|_| {
            RenderEngineError::load(format!(
                "temporary page path is not absolute: {}",
                page.path().display()
            ))
        })?;
        self.page = Some(page);

        self.on_tab("load", move |tab| {
            tab.navigate_to(url.as_str())
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|err| RenderEngineError::load(err.to_string()))
        })
        .await
    }

    async fn await_ready(&mut self, budget: Duration) -> Result<FontReadiness, RenderEngineError> {
        let script = FONT_READY_SCRIPT.replace("__BUDGET__", &budget.as_millis().to_string());

        let status = self
            .on_tab("await_ready", move |tab| {
                tab.evaluate(&script, true)
                    .map(|object| object.value)
                    .map_err(|err| RenderEngineError::internal(err.to_string()))
            })
            .await?;

        match status.as_ref().and_then(|value| value.as_str()) {
            Some("loaded") => Ok(FontReadiness::Loaded),
            other => {
                debug!(
                    target = "infra::chrome",
                    op = "chrome::await_ready",
                    status = other.unwrap_or("unknown"),
                    "Font set did not report loaded"
                );
                Ok(FontReadiness::Degraded)
            }
        }
    }

    async fn capture_pdf(&mut self, options: &CaptureOptions) -> Result<Vec<u8>, RenderEngineError> {
        let pdf_options = print_options(options);
        let started = Instant::now();

        let bytes = self
            .on_tab("capture", move |tab| {
                tab.print_to_pdf(Some(pdf_options))
                    .map_err(|err| RenderEngineError::capture(err.to_string()))
            })
            .await?;

        info!(
            target = "infra::chrome",
            op = "chrome::print_to_pdf",
            result = "ok",
            elapsed_ms = started.elapsed().as_millis() as u64,
            pdf_bytes = bytes.len(),
            "Captured page as PDF"
        );
        Ok(bytes)
    }

    async fn close(mut self: Box<Self>) -> Result<(), RenderEngineError> {
        let browser = self.browser.take();
        let page = self.page.take();

        task::spawn_blocking(move || {
            drop(browser);
            match page {
                Some(page) => page
                    .close()
                    .map_err(|err| RenderEngineError::teardown(format!("failed to remove page file: {err}"))),
                None => Ok(()),
            }
        })
        .await
        .map_err(|err| RenderEngineError::teardown(format!("close task failed: {err}")))?
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };

        warn!(
            target = "infra::chrome",
            op = "chrome::drop",
            "Render session dropped before close; killing browser"
        );
        // Killing the child waits on it, so keep that off the async workers.
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(browser));
            }
            Err(_) => drop(browser),
        }
    }
}

fn write_page(html: &str) -> Result<NamedTempFile, RenderEngineError> {
    let mut file = tempfile::Builder::new()
        .prefix("markpress-")
        .suffix(".html")
        .tempfile()
        .map_err(|err| RenderEngineError::load(format!("failed to create page file: {err}")))?;
    file.write_all(html.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| RenderEngineError::load(format!("failed to write page file: {err}")))?;
    Ok(file)
}

fn print_options(options: &CaptureOptions) -> PrintToPdfOptions {
    let (paper_width, paper_height) = options.format.dimensions_in();
    PrintToPdfOptions {
        landscape: Some(false),
        print_background: Some(options.print_background),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(options.margins.top),
        margin_bottom: Some(options.margins.bottom),
        margin_left: Some(options.margins.left),
        margin_right: Some(options.margins.right),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}
