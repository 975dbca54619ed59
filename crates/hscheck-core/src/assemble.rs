//! Typed blocks from the located structure and the reconstructed rows.

use tracing::warn;

use crate::geometry::Fragment;
use crate::model::{ExtractionWarning, InvoiceBlock, WarningKind};
use crate::parsing::normalize::contains_marker;
use crate::parsing::DocumentStructure;
use crate::table::BlockRows;

/// Printed subtotal and total of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTotals {
    pub subtotal: String,
    pub total_amount: String,
}

/// Read the subtotal/total pair after a block's close marker.
///
/// The subtotal is the line right after the marker and the total three lines
/// after it; the line in between must mention both "total" and "usd".
/// Otherwise both values are empty and a warning is returned.
pub fn block_totals(
    lines: &[Fragment],
    closing: Option<usize>,
    block: usize,
) -> (BlockTotals, Option<ExtractionWarning>) {
    let Some(st) = closing else {
        return (BlockTotals::default(), None);
    };

    let label = lines.get(st + 2).map(|l| l.text.as_str()).unwrap_or_default();
    match (lines.get(st + 1), lines.get(st + 3)) {
        (Some(subtotal), Some(total))
            if contains_marker(label, "total") && contains_marker(label, "usd") =>
        {
            let totals = BlockTotals {
                subtotal: subtotal.text.trim().to_string(),
                total_amount: total.text.trim().to_string(),
            };
            (totals, None)
        }
        _ => {
            let message =
                format!("block {block}: subtotal format mismatch after line {}", st + 1);
            warn!("{message}");
            let warning = ExtractionWarning {
                kind: WarningKind::SubtotalFormat,
                block,
                message,
            };
            (BlockTotals::default(), Some(warning))
        }
    }
}

/// Pair every block opening with its rows and printed totals.
///
/// Blocks without items are kept so block numbering matches the document.
pub fn assemble_blocks(
    lines: &[Fragment],
    structure: &DocumentStructure,
    rows: Vec<BlockRows>,
) -> (Vec<InvoiceBlock>, Vec<ExtractionWarning>) {
    let spans = structure.block_spans(lines.len());
    let mut rows = rows.into_iter();
    let mut blocks = Vec::with_capacity(spans.len());
    let mut warnings = Vec::new();

    for (i, (opening, span)) in structure.openings.iter().zip(&spans).enumerate() {
        let block_rows = rows.next().unwrap_or_default();
        warnings.extend(block_rows.warnings);

        let (totals, warning) = block_totals(lines, span.closing, i + 1);
        warnings.extend(warning);

        blocks.push(InvoiceBlock {
            hs_code: opening.hs_code.clone(),
            description: opening.description.clone(),
            subtotal: totals.subtotal,
            total_amount: totals.total_amount,
            items: block_rows.items,
        });
    }

    (blocks, warnings)
}
