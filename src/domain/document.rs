//! Documents flowing through the pipeline: the composed HTML handed to the
//! render engine, page geometry, and the resulting PDF bytes.

use bytes::Bytes;

/// Leading bytes of every PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Self-contained HTML document ready for the render engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    html: String,
    body: String,
    stylesheet: String,
}

impl RenderedDocument {
    pub fn new(html: String, body: String, stylesheet: String) -> Self {
        Self {
            html,
            body,
            stylesheet,
        }
    }

    /// The complete `<!DOCTYPE html>` document.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// The Markdown-derived fragment embedded in `<body>`.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }
}

/// Paper sizes understood by the render engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageFormat {
    #[default]
    A4,
}

impl PageFormat {
    /// Paper `(width, height)` in inches.
    pub fn dimensions_in(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.69),
        }
    }
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    /// 0.5in top and bottom, 0.75in left and right.
    fn default() -> Self {
        Self {
            top: 0.5,
            right: 0.75,
            bottom: 0.5,
            left: 0.75,
        }
    }
}

/// Settings for a single PDF capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub format: PageFormat,
    pub margins: Margins,
    pub print_background: bool,
}

impl CaptureOptions {
    pub fn new(format: PageFormat, margins: Margins) -> Self {
        Self {
            format,
            margins,
            print_background: true,
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::new(PageFormat::default(), Margins::default())
    }
}

/// PDF bytes produced by one conversion. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfArtifact {
    bytes: Bytes,
}

impl PdfArtifact {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn has_pdf_signature(&self) -> bool {
        self.bytes.starts_with(PDF_SIGNATURE)
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_margins_match_print_layout() {
        let margins = Margins::default();
        assert_eq!((margins.top, margins.bottom), (0.5, 0.5));
        assert_eq!((margins.left, margins.right), (0.75, 0.75));
    }

    #[test]
    fn default_capture_prints_backgrounds_on_a4() {
        let options = CaptureOptions::default();
        assert_eq!(options.format, PageFormat::A4);
        assert!(options.print_background);
    }

    #[test]
    fn artifact_detects_signature() {
        assert!(PdfArtifact::new(b"%PDF-1.7\n".to_vec()).has_pdf_signature());
        assert!(!PdfArtifact::new(b"<html>".to_vec()).has_pdf_signature());
        assert_eq!(PdfArtifact::new(b"%PDF-".to_vec()).byte_len(), 5);
    }
}
