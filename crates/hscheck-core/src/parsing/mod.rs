pub mod normalize;
pub mod values;

use serde::Serialize;
use tracing::warn;

use crate::geometry::Fragment;
use crate::model::{ExtractionWarning, GlobalTotals, WarningKind};
use normalize::{clean_text, contains_marker, find_marker};

pub const DESCRIPTION_MARKER: &str = "description of goods";
pub const SUBTOTAL_MARKER: &str = "sub total";
pub const CODE_MARKER: &str = "h.s code:";
pub const TOTAL_MARKER: &str = "total:";
pub const SHIPPED_MARKERS: &[&str] = &["shipped to", "shipped by"];

/// A "description of goods" line opening a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOpening {
    pub line_index: usize,
    pub hs_code: String,
    pub description: String,
}

/// Marker positions found in the reconciled lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStructure {
    pub openings: Vec<BlockOpening>,
    pub closings: Vec<usize>,
}

/// Line range of one block, with its close marker if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub opening: usize,
    pub closing: Option<usize>,
    /// Exclusive end: the close marker, the next opening, or the line count.
    pub end: usize,
}

impl DocumentStructure {
    /// Pair each opening with the first close marker before the next
    /// opening. Unclosed blocks end at the next opening, or the document end.
    pub fn block_spans(&self, line_count: usize) -> Vec<BlockSpan> {
        self.openings
            .iter()
            .enumerate()
            .map(|(i, opening)| {
                let next_opening = self.openings.get(i + 1).map(|o| o.line_index);
                let limit = next_opening.unwrap_or(line_count);
                let closing = self
                    .closings
                    .iter()
                    .copied()
                    .find(|&c| c > opening.line_index && c < limit);
                BlockSpan {
                    opening: opening.line_index,
                    closing,
                    end: closing.unwrap_or(limit),
                }
            })
            .collect()
    }

    /// One warning per block whose description line carried no code.
    pub fn missing_code_warnings(&self) -> Vec<ExtractionWarning> {
        self.openings
            .iter()
            .enumerate()
            .filter(|(_, o)| o.hs_code.is_empty())
            .map(|(i, o)| {
                let message = format!(
                    "goods '{}' at block {} does not have an H.S code",
                    o.description,
                    i + 1
                );
                warn!("{message}");
                ExtractionWarning {
                    kind: WarningKind::MissingHsCode,
                    block: i + 1,
                    message,
                }
            })
            .collect()
    }
}

/// Find block openings and close markers.
pub fn locate_structure(lines: &[Fragment]) -> DocumentStructure {
    let mut structure = DocumentStructure::default();

    for (i, line) in lines.iter().enumerate() {
        if contains_marker(&line.text, DESCRIPTION_MARKER) {
            let (description, hs_code) = parse_description_line(&line.text);
            structure.openings.push(BlockOpening {
                line_index: i,
                hs_code,
                description,
            });
        } else if contains_marker(&line.text, SUBTOTAL_MARKER) {
            structure.closings.push(i);
        }
    }

    structure
}

/// Split a description line into (description, hs_code).
///
/// "DESCRIPTION OF GOODS: VALVE H.S CODE: 8481.80 NW" -> ("VALVE", "8481.80")
fn parse_description_line(line: &str) -> (String, String) {
    let Some((_, rest)) = line.split_once(':') else {
        return (String::new(), String::new());
    };
    let rest = rest.trim();

    match find_marker(rest, CODE_MARKER) {
        Some(pos) => {
            let description = clean_text(rest[..pos].trim());
            let code = rest[pos + CODE_MARKER.len()..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            (description, code)
        }
        None => (clean_text(rest), String::new()),
    }
}

/// Document-wide printed totals.
///
/// The quantity total is the line after the first "total:" marker that is
/// not a sub total; the amount total is the last line.
pub fn locate_global_totals(lines: &[Fragment]) -> GlobalTotals {
    let quantity = lines
        .iter()
        .position(|l| {
            contains_marker(&l.text, TOTAL_MARKER) && !contains_marker(&l.text, SUBTOTAL_MARKER)
        })
        .and_then(|i| lines.get(i + 1))
        .map(|l| l.text.trim().to_string())
        .unwrap_or_default();
    let amount = lines
        .last()
        .map(|l| l.text.trim().to_string())
        .unwrap_or_default();
    GlobalTotals { quantity, amount }
}

/// First "shipped to/by" line on `page` above `limit_y`, nearest first.
pub fn find_shipped_marker(lines: &[Fragment], page: usize, limit_y: f32) -> Option<&Fragment> {
    lines
        .iter()
        .filter(|l| l.page_number == page && l.bbox.y_min < limit_y)
        .filter(|l| SHIPPED_MARKERS.iter().any(|m| contains_marker(&l.text, m)))
        .max_by(|a, b| a.bbox.y_min.total_cmp(&b.bbox.y_min))
}
