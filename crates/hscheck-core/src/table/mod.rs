//! Table reconstruction: column geometry from the header, row geometry per
//! block, and cell text assigned to fields.
//!
//! Column geometry is computed once, from the header above the first block,
//! and reused for every block and page of the document.

pub mod columns;
pub mod rows;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AuditError;
use crate::extraction::PageGeometry;
use crate::geometry::Fragment;
use crate::model::{ExtractionWarning, Field, InvoiceItem, WarningKind};
use crate::parsing::normalize::clean_text;
use crate::parsing::{find_shipped_marker, BlockSpan, DocumentStructure};
use crate::Tolerances;
use columns::{identify_columns, FieldColumn};
use rows::extract_segment_rows;

/// Vertical span of the table header on one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeaderBand {
    pub page_number: usize,
    pub y_min: f32,
    pub y_max: f32,
}

/// The part of one page a block's rows are read from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub page_number: usize,
    pub y_min: f32,
    pub y_max: f32,
}

/// Items reconstructed for one block, plus warnings for dropped rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockRows {
    pub items: Vec<InvoiceItem>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Header band between the nearest "shipped to/by" line and the first
/// block opening, on the opening's page.
pub fn locate_header_band(
    lines: &[Fragment],
    structure: &DocumentStructure,
) -> Result<HeaderBand, AuditError> {
    let opening = structure
        .openings
        .first()
        .and_then(|o| lines.get(o.line_index))
        .ok_or(AuditError::NoHeaderRegion)?;
    let marker = find_shipped_marker(lines, opening.page_number, opening.bbox.y_min)
        .ok_or(AuditError::NoHeaderRegion)?;
    Ok(HeaderBand {
        page_number: opening.page_number,
        y_min: marker.bbox.y_min,
        y_max: opening.bbox.y_min,
    })
}

/// Page segments covered by one block, in page order.
///
/// The opening page is read from the opening line down; the boundary page
/// (close marker or next opening) from the top down to the boundary. Pages
/// in between are read in full.
pub fn block_segments(
    pages: &[PageGeometry],
    lines: &[Fragment],
    span: &BlockSpan,
) -> Vec<Segment> {
    let Some(opening) = lines.get(span.opening) else {
        return Vec::new();
    };
    let boundary = lines.get(span.end);
    let first_page = opening.page_number;
    let last_page = boundary
        .or(lines.last())
        .map(|l| l.page_number)
        .unwrap_or(first_page)
        .max(first_page);

    (first_page..=last_page)
        .filter_map(|n| {
            let page = page_by_number(pages, n)?;
            let y_min = if n == first_page { opening.bbox.y_min } else { 0.0 };
            let y_max = match boundary {
                Some(b) if b.page_number == n => b.bbox.y_min,
                _ => page_bottom(page),
            };
            Some(Segment {
                page_number: n,
                y_min,
                y_max,
            })
        })
        .collect()
}

/// Reconstruct the items of every block.
///
/// Fails when the header band or the columns cannot be found; the result
/// has one entry per block opening otherwise.
pub fn reconstruct_tables(
    pages: &[PageGeometry],
    lines: &[Fragment],
    structure: &DocumentStructure,
    fields: &[Field],
    primary: Field,
    tolerances: &Tolerances,
) -> Result<Vec<BlockRows>, AuditError> {
    if structure.openings.is_empty() {
        return Ok(Vec::new());
    }

    let band = locate_header_band(lines, structure)?;
    let header_page = page_by_number(pages, band.page_number).ok_or(AuditError::NoHeaderRegion)?;
    let columns = identify_columns(header_page, &band, fields, tolerances)?;

    let blocks = structure
        .block_spans(lines.len())
        .iter()
        .enumerate()
        .map(|(i, span)| {
            let rows = block_rows(pages, lines, span, &columns, primary, tolerances, i + 1);
            info!(block = i + 1, items = rows.items.len(), "reconstructed block");
            rows
        })
        .collect();
    Ok(blocks)
}

fn block_rows(
    pages: &[PageGeometry],
    lines: &[Fragment],
    span: &BlockSpan,
    columns: &[FieldColumn],
    primary: Field,
    tolerances: &Tolerances,
    block: usize,
) -> BlockRows {
    let mut out = BlockRows::default();

    for segment in block_segments(pages, lines, span) {
        let Some(page) = page_by_number(pages, segment.page_number) else {
            continue;
        };
        debug!(
            block,
            page = segment.page_number,
            y_min = segment.y_min,
            y_max = segment.y_max,
            "reading block segment"
        );

        for cells in extract_segment_rows(page, &segment, columns, tolerances) {
            let item = build_item(&cells);
            if !item.get(primary).trim().is_empty() {
                out.items.push(item);
            } else if !item.is_blank() {
                let message = format!(
                    "block {block}: discarded row without {primary} on page {}",
                    segment.page_number
                );
                warn!("{message}");
                out.warnings.push(ExtractionWarning {
                    kind: WarningKind::RowDiscarded,
                    block,
                    message,
                });
            }
        }
    }

    out
}

fn build_item(cells: &[(Field, String)]) -> InvoiceItem {
    let mut item = InvoiceItem::default();
    for (field, text) in cells {
        if !item.append(*field, text) {
            debug!("dropped text '{text}' in {field}");
        }
    }
    item.final_customer = clean_text(&item.final_customer);
    item
}

pub(crate) fn page_by_number(pages: &[PageGeometry], number: usize) -> Option<&PageGeometry> {
    pages.iter().find(|p| p.page_number == number)
}

/// Page height, or the lowest drawn or written edge when the provider
/// reported no size.
fn page_bottom(page: &PageGeometry) -> f32 {
    if page.height > 0.0 {
        return page.height;
    }
    page.words
        .iter()
        .chain(&page.lines)
        .map(|f| f.bbox.y_max)
        .chain(page.rects.iter().map(|r| r.y_max))
        .fold(0.0, f32::max)
        + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::parsing::locate_structure;

    fn line(page: usize, text: &str, y: f32) -> Fragment {
        Fragment::new(page, 0, text, BBox::new(20.0, y, 90.0, y + 10.0).unwrap())
    }

    fn page(n: usize) -> PageGeometry {
        PageGeometry {
            page_number: n,
            width: 600.0,
            height: 800.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_header_band_between_markers() {
        let lines = vec![
            line(1, "SHIPPED TO/BY", 40.0),
            line(1, "DESCRIPTION OF GOODS: VALVE", 120.0),
        ];
        let band = locate_header_band(&lines, &locate_structure(&lines)).unwrap();
        assert_eq!(band, HeaderBand { page_number: 1, y_min: 40.0, y_max: 120.0 });
    }

    #[test]
    fn test_header_band_requires_shipped_marker_on_same_page() {
        let lines = vec![
            line(1, "SHIPPED TO/BY", 40.0),
            line(2, "DESCRIPTION OF GOODS: VALVE", 120.0),
        ];
        let err = locate_header_band(&lines, &locate_structure(&lines)).unwrap_err();
        assert!(matches!(err, AuditError::NoHeaderRegion));
    }

    #[test]
    fn test_segments_same_page_and_cross_page() {
        let pages = vec![page(1), page(2), page(3)];
        let lines = vec![
            line(1, "DESCRIPTION OF GOODS: A", 120.0),
            line(1, "SUB TOTAL", 300.0),
            line(1, "DESCRIPTION OF GOODS: B", 500.0),
            line(3, "SUB TOTAL", 200.0),
        ];
        let spans = locate_structure(&lines).block_spans(lines.len());

        let first = block_segments(&pages, &lines, &spans[0]);
        assert_eq!(first, vec![Segment { page_number: 1, y_min: 120.0, y_max: 300.0 }]);

        let second = block_segments(&pages, &lines, &spans[1]);
        assert_eq!(
            second,
            vec![
                Segment { page_number: 1, y_min: 500.0, y_max: 800.0 },
                Segment { page_number: 2, y_min: 0.0, y_max: 800.0 },
                Segment { page_number: 3, y_min: 0.0, y_max: 200.0 },
            ]
        );
    }

    #[test]
    fn test_unclosed_last_block_runs_to_last_line_page() {
        let pages = vec![page(1), page(2), page(3)];
        let lines = vec![line(1, "DESCRIPTION OF GOODS: A", 120.0), line(2, "x", 50.0)];
        let spans = locate_structure(&lines).block_spans(lines.len());
        let segments = block_segments(&pages, &lines, &spans[0]);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].y_max, 800.0);
    }

    #[test]
    fn test_page_bottom_without_size() {
        let mut p = page(1);
        p.height = 0.0;
        p.lines.push(line(1, "x", 700.0));
        assert_eq!(page_bottom(&p), 711.0);
    }

    #[test]
    fn test_build_item_cleans_customer() {
        let item = build_item(&[
            (Field::FinalCustomer, "AIFI (GOODMAN)".to_string()),
            (Field::Unknown(8), "ignored".to_string()),
            (Field::ReferenceCode, "U11-001".to_string()),
        ]);
        assert_eq!(item.final_customer, "AIFI(GOODMAN)");
        assert_eq!(item.reference_code, "U11-001");
    }
}
