use clap::Args;
use hscheck_core::error::AuditError;
use hscheck_core::extraction::reference::{
    load_reference_xlsx, DEFAULT_CODE_COLUMN, DEFAULT_ITEM_COLUMN,
};
use hscheck_core::validate::compare::compare_codes;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{audit_file, emit_report, PipelineArgs};

/// Which reference spreadsheet columns to read and how to compare codes.
#[derive(Args, Debug, Clone)]
pub struct ReferenceArgs {
    /// Reference column holding the item code
    #[arg(long, default_value = DEFAULT_ITEM_COLUMN)]
    pub item_col: String,

    /// Reference column holding the expected HS code
    #[arg(long, default_value = DEFAULT_CODE_COLUMN)]
    pub hscode_col: String,

    /// Compare HS codes literally instead of ignoring dots
    #[arg(long)]
    pub exact_codes: bool,
}

pub fn run(
    pdf_file: &Path,
    xlsx_file: &Path,
    reference: &ReferenceArgs,
    pipeline: &PipelineArgs,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<bool, AuditError> {
    // Load the mapping first so a bad spreadsheet fails before extraction
    let xlsx_bytes = std::fs::read(xlsx_file)?;
    let mapping = load_reference_xlsx(&xlsx_bytes, &reference.item_col, &reference.hscode_col)?;
    info!(entries = mapping.len(), "loaded reference mapping");

    let mut report = audit_file(pdf_file, pipeline)?;
    let findings = compare_codes(&report.blocks, &mapping, !reference.exact_codes);
    report.discrepancies.extend(findings);

    emit_report(&report, output_format, output_file)
}
