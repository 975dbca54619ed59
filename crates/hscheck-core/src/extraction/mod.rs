pub mod drawings;
pub mod ocr;
pub mod pdftotext;
pub mod reference;

use serde::Serialize;

use crate::error::AuditError;
use crate::geometry::{BBox, Fragment, Orientation, Ruling};

/// Geometry of a single page: positioned words, the provider's own lines,
/// and drawn rectangles. Coordinates use a top-left origin.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageGeometry {
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub words: Vec<Fragment>,
    pub lines: Vec<Fragment>,
    pub rects: Vec<BBox>,
}

impl PageGeometry {
    /// Drawn rectangles that classify as rulings of `orientation`.
    pub fn rulings(&self, orientation: Orientation) -> impl Iterator<Item = Ruling> + '_ {
        self.rects
            .iter()
            .filter_map(Ruling::classify)
            .filter(move |r| r.orientation == orientation)
    }

    pub fn has_text(&self) -> bool {
        self.lines.iter().any(|l| !l.text.trim().is_empty())
    }
}

/// Trait for page text/geometry backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract per-page geometry from PDF bytes, one entry per page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageGeometry>, AuditError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Trait for OCR backends that add a text layer to scanned documents.
pub trait OcrEngine: Send + Sync {
    /// Return a copy of the document with recognized text layers.
    fn ocr(&self, pdf_bytes: &[u8], language: &str) -> Result<Vec<u8>, AuditError>;

    fn backend_name(&self) -> &str;
}

/// All lines of the document in page order.
pub fn document_lines(pages: &[PageGeometry]) -> Vec<Fragment> {
    pages.iter().flat_map(|p| p.lines.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rulings_filter_by_orientation() {
        let page = PageGeometry {
            page_number: 1,
            width: 600.0,
            height: 800.0,
            rects: vec![
                BBox::new(20.0, 100.0, 580.0, 100.5).unwrap(),
                BBox::new(99.5, 60.0, 100.5, 110.0).unwrap(),
                BBox::new(20.0, 60.0, 100.0, 80.0).unwrap(),
            ],
            ..Default::default()
        };
        assert_eq!(page.rulings(Orientation::Horizontal).count(), 1);
        assert_eq!(page.rulings(Orientation::Vertical).count(), 1);
        assert!(!page.has_text());
    }
}
