use clap::ValueEnum;
use hscheck_core::error::AuditError;
use hscheck_core::extraction::pdftotext::PdftotextExtractor;
use hscheck_core::extraction::{document_lines, PdfExtractor};
use hscheck_core::reconcile::reconcile_stages;
use hscheck_core::Tolerances;
use std::path::Path;

use super::TruncateArgs;
use crate::output;

/// Reconciliation stage to dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Raw,
    Truncated,
    /// After splitting over-tall lines
    Split,
    Merged,
    /// After splitting over-wide lines; what the parser sees
    Final,
}

pub fn run(
    pdf_file: &Path,
    stage: Stage,
    truncate: &TruncateArgs,
    output_format: &str,
) -> Result<(), AuditError> {
    let pdf_bytes = std::fs::read(pdf_file)?;
    let pages = PdftotextExtractor::new().extract_pages(&pdf_bytes)?;
    let marker = truncate.marker();
    let stages = reconcile_stages(
        document_lines(&pages),
        marker.as_deref(),
        &Tolerances::default(),
    );

    let lines = match stage {
        Stage::Raw => &stages.raw,
        Stage::Truncated => &stages.truncated,
        Stage::Split => &stages.height_split,
        Stage::Merged => &stages.merged,
        Stage::Final => &stages.width_split,
    };

    match output_format {
        "json" => output::json::print_lines(lines)?,
        _ => output::table::print_lines(lines),
    }
    Ok(())
}
