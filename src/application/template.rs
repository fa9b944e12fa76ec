//! Wraps a Markdown-derived HTML fragment in a complete, print-ready document.
//!
//! The fragment is embedded verbatim. Escaping user text is the Markdown
//! transformer's job; nothing here sanitises.

use askama::{Error as AskamaError, Template};
use thiserror::Error;
use url::Url;

use crate::domain::document::RenderedDocument;

/// Title used when the caller does not provide one.
pub const DEFAULT_TITLE: &str = "Markdown Document";

/// Web fonts covering Latin, Simplified Chinese, Japanese and Korean text.
pub const DEFAULT_FONT_STYLESHEET_URL: &str = "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=Fira+Code:wght@300;400;500;600&family=Noto+Sans:wght@300;400;500;600;700&family=Noto+Sans+SC:wght@300;400;500;600;700&family=Noto+Sans+JP:wght@300;400;500;600;700&family=Noto+Sans+KR:wght@300;400;500;600;700&display=swap";

const BASE_STYLESHEET: &str = include_str!("../../templates/document.css");

#[derive(Template)]
#[template(path = "document.html")]
struct DocumentTemplate<'a> {
    title: &'a str,
    stylesheet: &'a str,
    body: &'a str,
}

#[derive(Debug, Error)]
#[error("failed to compose document: {0}")]
pub struct TemplateError(#[from] AskamaError);

/// Produces [`RenderedDocument`]s with a fixed GitHub-like print stylesheet.
#[derive(Debug, Clone)]
pub struct DocumentTemplater {
    stylesheet: String,
}

impl DocumentTemplater {
    /// `font_stylesheet` is imported ahead of the base rules; `None` keeps the
    /// document free of remote references and relies on installed fonts.
    pub fn new(font_stylesheet: Option<&Url>) -> Self {
        let stylesheet = match font_stylesheet {
            // `Url` serialisation percent-encodes quotes and angle brackets.
            Some(url) => format!("@import url(\"{url}\");\n\n{BASE_STYLESHEET}"),
            None => BASE_STYLESHEET.to_string(),
        };
        Self { stylesheet }
    }

    /// Templater without remote fonts.
    pub fn offline() -> Self {
        Self::new(None)
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn wrap(&self, fragment: &str) -> Result<RenderedDocument, TemplateError> {
        self.wrap_with_title(fragment, DEFAULT_TITLE)
    }

    pub fn wrap_with_title(
        &self,
        fragment: &str,
        title: &str,
    ) -> Result<RenderedDocument, TemplateError> {
        let html = DocumentTemplate {
            title,
            stylesheet: &self.stylesheet,
            body: fragment,
        }
        .render()?;

        Ok(RenderedDocument::new(
            html,
            fragment.to_string(),
            self.stylesheet.clone(),
        ))
    }
}

impl Default for DocumentTemplater {
    fn default() -> Self {
        let url = Url::parse(DEFAULT_FONT_STYLESHEET_URL).ok();
        Self::new(url.as_ref())
    }
}
