pub mod audit;
pub mod columns;
pub mod extract;
pub mod lines;
pub mod select;

use clap::Args;
use hscheck_core::config::{self, builtin, ColumnConfigSet};
use hscheck_core::error::AuditError;
use hscheck_core::extraction::ocr::OcrmypdfEngine;
use hscheck_core::extraction::pdftotext::PdftotextExtractor;
use hscheck_core::extraction::OcrEngine;
use hscheck_core::model::AuditReport;
use hscheck_core::{AuditOptions, DEFAULT_OCR_LANGUAGE, DEFAULT_TRUNCATE_MARKER};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::output;

/// Where the document's trailing boilerplate starts.
#[derive(Args, Debug, Clone)]
pub struct TruncateArgs {
    /// Drop every line from the first one containing this marker
    #[arg(long, value_name = "MARKER", default_value = DEFAULT_TRUNCATE_MARKER)]
    pub truncate: String,

    /// Keep the whole document
    #[arg(long, conflicts_with = "truncate")]
    pub no_truncate: bool,
}

impl TruncateArgs {
    pub fn marker(&self) -> Option<String> {
        (!self.no_truncate).then(|| self.truncate.clone())
    }
}

/// Options shared by every command that runs the full pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Column configuration file (JSON); the built-in layouts otherwise
    #[arg(long, value_name = "FILE")]
    pub columns: Option<PathBuf>,

    /// Layout key within the column configuration
    #[arg(long, default_value = builtin::DEFAULT_KEY)]
    pub column_key: String,

    #[command(flatten)]
    pub truncate: TruncateArgs,

    /// OCR language hint for documents without a text layer
    #[arg(long, default_value = DEFAULT_OCR_LANGUAGE)]
    pub ocr_lang: String,

    /// Never fall back to OCR
    #[arg(long)]
    pub no_ocr: bool,

    /// Read rows in fixed line groups when no table columns can be found
    #[arg(long)]
    pub fixed_stride: bool,
}

impl PipelineArgs {
    pub fn options(&self) -> AuditOptions {
        AuditOptions {
            truncate_marker: self.truncate.marker(),
            column_key: self.column_key.clone(),
            ocr_language: self.ocr_lang.clone(),
            allow_fixed_stride: self.fixed_stride,
            ..Default::default()
        }
    }
}

pub fn load_columns(path: Option<&Path>) -> Result<ColumnConfigSet, AuditError> {
    match path {
        Some(path) => config::load_column_config(path),
        None => builtin::default_columns(),
    }
}

/// Run extraction, reconstruction and validation on one PDF.
pub fn audit_file(pdf_file: &Path, args: &PipelineArgs) -> Result<AuditReport, AuditError> {
    let pdf_bytes = std::fs::read(pdf_file)?;
    let columns = load_columns(args.columns.as_deref())?;
    let options = args.options();

    let extractor = PdftotextExtractor::new();
    let engine = OcrmypdfEngine::new();
    let ocr: Option<&dyn OcrEngine> = if args.no_ocr {
        None
    } else if OcrmypdfEngine::is_available() {
        Some(&engine)
    } else {
        info!("ocrmypdf not found, OCR fallback disabled");
        None
    };

    let mut report = hscheck_core::audit_pdf(&pdf_bytes, &extractor, ocr, &columns, &options)?;
    report.source = Some(pdf_file.display().to_string());
    Ok(report)
}

/// Print or save a report. Returns true when it has discrepancies.
pub fn emit_report(
    report: &AuditReport,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<bool, AuditError> {
    match output_file {
        Some(path) => {
            // Always write JSON when saving to file
            let json = serde_json::to_string_pretty(report)?;
            std::fs::write(&path, json)?;
            eprintln!(
                "Audited {} block(s), {} item(s), written to {}",
                report.blocks.len(),
                report.item_count(),
                path.display()
            );
            for w in &report.warnings {
                eprintln!("  warning: {}", w.message);
            }
            if !report.discrepancies.is_empty() {
                eprintln!("  {} discrepancy(ies) found", report.discrepancies.len());
            }
        }
        None => match output_format {
            "json" => output::json::print_report(report)?,
            _ => output::table::print_report(report),
        },
    }
    Ok(!report.discrepancies.is_empty())
}
