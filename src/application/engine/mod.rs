//! Render engine capability interface.
//!
//! A [`RenderEngine`] launches isolated [`RenderSession`]s. Each session owns
//! exactly one engine process and page, is used by a single conversion, and is
//! torn down when that conversion ends. The [`controller`] drives sessions
//! through [`SessionState`] with bounded waits.

mod controller;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::document::{CaptureOptions, RenderedDocument};

pub use controller::{RenderController, RenderTimeouts};

/// Pipeline stage in which an engine error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Launch,
    Load,
    Fonts,
    Capture,
    Close,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::Launch => "launch",
            RenderStage::Load => "load",
            RenderStage::Fonts => "fonts",
            RenderStage::Capture => "capture",
            RenderStage::Close => "close",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderEngineError {
    #[error("render engine failed to launch: {message}")]
    Launch { message: String },
    #[error("render engine failed to load content: {message}")]
    Load { message: String },
    #[error("render engine timed out during {stage} after {}ms", .after.as_millis())]
    Timeout { stage: RenderStage, after: Duration },
    #[error("render engine failed to capture PDF: {message}")]
    Capture { message: String },
    #[error("render engine failed to shut down: {message}")]
    Teardown { message: String },
    #[error("render engine internal error: {message}")]
    Internal { message: String },
}

impl RenderEngineError {
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn timeout(stage: RenderStage, after: Duration) -> Self {
        Self::Timeout { stage, after }
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderEngineError::Launch { .. } => "launch",
            RenderEngineError::Load { .. } => "load",
            RenderEngineError::Timeout { .. } => "timeout",
            RenderEngineError::Capture { .. } => "capture",
            RenderEngineError::Teardown { .. } => "teardown",
            RenderEngineError::Internal { .. } => "internal",
        }
    }
}

/// Result of waiting for web fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontReadiness {
    /// Every referenced font finished loading.
    Loaded,
    /// The page gave up waiting or some fonts failed; capture proceeds with
    /// whatever is available.
    Degraded,
}

/// Launches render sessions. Implementations are shared across requests;
/// sessions never are.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start one isolated engine process with a fresh page.
    ///
    /// If the returned future is dropped before completion, any process it
    /// started must still be terminated.
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderEngineError>;
}

/// One exclusive engine process/page pair.
///
/// Dropping a session without calling [`RenderSession::close`] must terminate
/// the underlying process; this is the cancellation path.
#[async_trait]
pub trait RenderSession: Send {
    async fn load_content(&mut self, document: &RenderedDocument) -> Result<(), RenderEngineError>;

    /// Wait for the page's font-readiness signal for at most `budget`.
    async fn await_ready(&mut self, budget: Duration) -> Result<FontReadiness, RenderEngineError>;

    async fn capture_pdf(&mut self, options: &CaptureOptions) -> Result<Vec<u8>, RenderEngineError>;

    /// Terminate the process and release every resource.
    async fn close(self: Box<Self>) -> Result<(), RenderEngineError>;
}

/// Lifecycle of one render session.
///
/// `Idle → Launching → PageLoading → AwaitingFonts → Capturing → Closed`, with
/// `Failed` reachable from every non-terminal state. Both terminal states
/// imply the engine process has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Launching,
    PageLoading,
    AwaitingFonts,
    Capturing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Idle, Launching)
            | (Launching, PageLoading)
            | (PageLoading, AwaitingFonts)
            | (AwaitingFonts, Capturing)
            | (Capturing, Closed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Launching => "launching",
            SessionState::PageLoading => "page_loading",
            SessionState::AwaitingFonts => "awaiting_fonts",
            SessionState::Capturing => "capturing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}
