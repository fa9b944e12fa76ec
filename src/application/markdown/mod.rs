//! Markdown to HTML transformation.
//!
//! The transformer is pure: it performs no I/O, never fails, and returns
//! byte-identical output for identical input. Constructs that do not parse
//! fall back to literal text.

mod config;

use std::sync::Arc;

use comrak::{Options, markdown_to_html};
use once_cell::sync::Lazy;

use config::{build_sanitizer, default_options};

/// GitHub-flavoured Markdown renderer with HTML sanitisation.
pub struct MarkdownTransformer {
    options: Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownTransformer {
    /// Construct a transformer with tables, strikethrough, task lists,
    /// autolinks and footnotes enabled.
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    /// Render `source` to an HTML fragment with all user text escaped.
    pub fn to_html(&self, source: &str) -> String {
        let rendered = markdown_to_html(source, &self.options);
        self.sanitizer.clean(&rendered).to_string()
    }
}

impl Default for MarkdownTransformer {
    fn default() -> Self {
        Self::new()
    }
}

static TRANSFORMER: Lazy<Arc<MarkdownTransformer>> =
    Lazy::new(|| Arc::new(MarkdownTransformer::new()));

/// Access the shared transformer instance, initialised on first use.
pub fn markdown_transformer() -> Arc<MarkdownTransformer> {
    Arc::clone(&TRANSFORMER)
}
