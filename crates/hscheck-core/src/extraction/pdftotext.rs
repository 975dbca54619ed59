use crate::error::AuditError;
use crate::extraction::{drawings, PageGeometry, PdfExtractor};
use crate::geometry::{BBox, Fragment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;
use tracing::{debug, warn};

/// Geometry backend using pdftotext (from poppler-utils) for words and lines,
/// and lopdf for drawn rectangles.
///
/// Uses `pdftotext -bbox-layout`, whose coordinates already have a top-left
/// origin.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageGeometry>, AuditError> {
        let mut tmpfile =
            tempfile::NamedTempFile::new().map_err(|e| AuditError::Extraction(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| AuditError::Extraction(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-bbox-layout")
            .arg(tmpfile.path())
            .arg("-")
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AuditError::PdftotextNotFound
                } else {
                    AuditError::Extraction(format!("pdftotext -bbox-layout failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(AuditError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let mut pages = parse_bbox_xml(&xml)?;

        // Rectangles are optional: a document without readable drawings still
        // has text, and table reconstruction reports what it cannot find.
        match drawings::extract_rects(pdf_bytes) {
            Ok(rects) => {
                for (page, page_rects) in pages.iter_mut().zip(rects) {
                    page.rects = page_rects;
                }
            }
            Err(e) => warn!("could not read drawn rectangles: {e}"),
        }

        debug!(pages = pages.len(), "pdftotext extraction complete");
        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Parse `pdftotext -bbox-layout` XHTML into per-page geometry.
///
/// Pages are numbered by order of appearance. Each `<line>` becomes a line
/// fragment whose text is its words joined by single spaces.
pub fn parse_bbox_xml(xml: &str) -> Result<Vec<PageGeometry>, AuditError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<PageGeometry> = Vec::new();
    let mut line_bbox: Option<BBox> = None;
    let mut line_words: Vec<String> = Vec::new();
    let mut word_bbox: Option<BBox> = None;
    let mut word_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => pages.push(start_page(&e, pages.len() + 1)),
                b"line" => {
                    line_bbox = parse_bbox(&e);
                    line_words.clear();
                }
                b"word" => {
                    word_bbox = parse_bbox(&e);
                    word_text.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"page" => {
                pages.push(start_page(&e, pages.len() + 1));
            }
            Ok(Event::Text(t)) if word_bbox.is_some() => {
                let text = t
                    .unescape()
                    .map_err(|e| AuditError::ParseError(format!("bad word text: {e}")))?;
                word_text.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"word" => {
                    let text = word_text.trim().to_string();
                    if let (Some(bbox), Some(page)) = (word_bbox.take(), pages.last_mut()) {
                        if !text.is_empty() {
                            let index = page.words.len() + 1;
                            line_words.push(text.clone());
                            page.words.push(Fragment::new(page.page_number, index, text, bbox));
                        }
                    }
                }
                b"line" => {
                    let text = line_words.join(" ");
                    if let (Some(bbox), Some(page)) = (line_bbox.take(), pages.last_mut()) {
                        if !text.is_empty() {
                            let index = page.lines.len() + 1;
                            page.lines.push(Fragment::new(page.page_number, index, text, bbox));
                        }
                    }
                    line_words.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AuditError::ParseError(format!(
                    "malformed bbox output at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(pages)
}

fn start_page(tag: &BytesStart, page_number: usize) -> PageGeometry {
    PageGeometry {
        page_number,
        width: attr_f32(tag, "width").unwrap_or_default(),
        height: attr_f32(tag, "height").unwrap_or_default(),
        ..Default::default()
    }
}

fn attr_f32(tag: &BytesStart, name: &str) -> Option<f32> {
    let attr = tag.try_get_attribute(name).ok()??;
    let value = attr.unescape_value().ok()?;
    value.trim().parse().ok()
}

fn parse_bbox(tag: &BytesStart) -> Option<BBox> {
    BBox::new(
        attr_f32(tag, "xMin")?,
        attr_f32(tag, "yMin")?,
        attr_f32(tag, "xMax")?,
        attr_f32(tag, "yMax")?,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
<doc>
  <page width="595.000000" height="842.000000">
    <flow>
      <block xMin="20.0" yMin="40.0" xMax="140.0" yMax="62.0">
        <line xMin="20.0" yMin="40.0" xMax="90.0" yMax="50.0">
          <word xMin="20.0" yMin="40.0" xMax="60.0" yMax="50.0">SHIPPED</word>
          <word xMin="62.0" yMin="40.0" xMax="90.0" yMax="50.0">TO/BY</word>
        </line>
        <line xMin="20.0" yMin="52.0" xMax="80.0" yMax="62.0">
          <word xMin="20.0" yMin="52.0" xMax="80.0" yMax="62.0">A&amp;B</word>
        </line>
      </block>
    </flow>
  </page>
  <page width="595.000000" height="842.000000">
  </page>
</doc>
</body>
</html>
"#;

    #[test]
    fn test_parse_bbox_xml_lines_and_words() {
        let pages = parse_bbox_xml(SAMPLE).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].height, 842.0);
        assert_eq!(pages[0].lines.len(), 2);
        assert_eq!(pages[0].lines[0].text, "SHIPPED TO/BY");
        assert_eq!(pages[0].lines[0].index, 1);
        assert_eq!(pages[0].lines[1].text, "A&B");
        assert_eq!(pages[0].words.len(), 3);
        assert_eq!(pages[0].words[1].bbox.x_min, 62.0);
        assert_eq!(pages[1].page_number, 2);
        assert!(pages[1].lines.is_empty());
    }

    #[test]
    fn test_parse_bbox_xml_rejects_garbage() {
        assert!(parse_bbox_xml("<doc><page></doc>").is_err());
    }
}
