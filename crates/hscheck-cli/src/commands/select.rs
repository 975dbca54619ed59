use hscheck_core::error::AuditError;
use hscheck_core::extraction::pdftotext::PdftotextExtractor;
use hscheck_core::extraction::PdfExtractor;
use hscheck_core::rules::{extract_by_rules, load_rules};
use hscheck_core::{prepare_lines, AuditOptions};
use std::path::Path;

use super::TruncateArgs;
use crate::output;

pub fn run(
    pdf_file: &Path,
    rules_file: &Path,
    truncate: &TruncateArgs,
    output_format: &str,
) -> Result<(), AuditError> {
    let rules = load_rules(rules_file)?;
    let pdf_bytes = std::fs::read(pdf_file)?;
    let pages = PdftotextExtractor::new().extract_pages(&pdf_bytes)?;

    // Selectors address the reconciled lines, as shown by `lines --stage final`
    let options = AuditOptions {
        truncate_marker: truncate.marker(),
        ..Default::default()
    };
    let lines = prepare_lines(&pages, &options);
    let selected = extract_by_rules(&lines, &rules);

    match output_format {
        "json" => output::json::print_selected(&selected)?,
        _ => output::table::print_selected(&selected),
    }
    Ok(())
}
