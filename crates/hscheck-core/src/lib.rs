pub mod assemble;
pub mod config;
pub mod error;
pub mod extraction;
pub mod geometry;
pub mod legacy;
pub mod model;
pub mod parsing;
pub mod reconcile;
pub mod rules;
pub mod table;
pub mod validate;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use config::ColumnConfigSet;
use error::AuditError;
use extraction::{OcrEngine, PageGeometry, PdfExtractor};
use geometry::{Fragment, HORIZONTAL_TOLERANCE, VERTICAL_TOLERANCE};
use model::{AuditReport, ExtractionWarning, Field, WarningKind};

pub const DEFAULT_TRUNCATE_MARKER: &str = "SAY U.S.DOLLARS";
pub const DEFAULT_OCR_LANGUAGE: &str = "chi_sim+eng";

/// Geometric and numeric tolerances used throughout the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tolerances {
    /// Ruling dedup, cell containment and reading-order line grouping.
    pub vertical: f32,
    /// Largest gap below a line at which the next line still continues it.
    pub merge_gap: f32,
    /// Centered-line test and column assignment slack.
    pub horizontal: f32,
    /// Edge alignment test for merging.
    pub legacy_alignment: f32,
    /// Absolute tolerance for every arithmetic check.
    pub numeric: Decimal,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            vertical: VERTICAL_TOLERANCE,
            merge_gap: 3.0,
            horizontal: HORIZONTAL_TOLERANCE,
            legacy_alignment: 50.0,
            numeric: Decimal::new(1, 2),
        }
    }
}

/// Options for one audit run.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOptions {
    /// Lines from the first one containing this marker onwards are dropped.
    pub truncate_marker: Option<String>,
    /// Key into the column configuration set.
    pub column_key: String,
    /// Field whose presence makes a table row an item.
    pub primary_field: Field,
    pub ocr_language: String,
    /// Fall back to fixed-stride extraction when columns cannot be found.
    pub allow_fixed_stride: bool,
    pub tolerances: Tolerances,
}

impl Default for AuditOptions {
    fn default() -> Self {
        AuditOptions {
            truncate_marker: Some(DEFAULT_TRUNCATE_MARKER.to_string()),
            column_key: config::builtin::DEFAULT_KEY.to_string(),
            primary_field: Field::ReferenceCode,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            allow_fixed_stride: false,
            tolerances: Tolerances::default(),
        }
    }
}

/// Main API entry point: reconstruct and validate an invoice PDF.
///
/// When the extractor finds no text at all and an OCR engine is given, the
/// document is run through OCR once and extracted again. OCR failure is not
/// fatal; the report carries a warning instead.
pub fn audit_pdf(
    pdf_bytes: &[u8],
    extractor: &dyn PdfExtractor,
    ocr: Option<&dyn OcrEngine>,
    columns: &ColumnConfigSet,
    options: &AuditOptions,
) -> Result<AuditReport, AuditError> {
    let (pages, ocr_warning) = extract_with_ocr_fallback(pdf_bytes, extractor, ocr, options)?;

    let mut report = audit_pages(&pages, columns, options)?;
    report.backend = extractor.backend_name().to_string();
    if let Some(warning) = ocr_warning {
        report.warnings.insert(0, warning);
    }
    Ok(report)
}

/// Extract page geometry, retrying once through OCR when no page has text.
pub fn extract_with_ocr_fallback(
    pdf_bytes: &[u8],
    extractor: &dyn PdfExtractor,
    ocr: Option<&dyn OcrEngine>,
    options: &AuditOptions,
) -> Result<(Vec<PageGeometry>, Option<ExtractionWarning>), AuditError> {
    let pages = extractor.extract_pages(pdf_bytes)?;
    if pages.iter().any(PageGeometry::has_text) {
        return Ok((pages, None));
    }
    let Some(ocr) = ocr else {
        return Ok((pages, None));
    };

    info!(engine = ocr.backend_name(), "no text found, trying OCR");
    let retried = ocr
        .ocr(pdf_bytes, &options.ocr_language)
        .and_then(|bytes| extractor.extract_pages(&bytes));
    match retried {
        Ok(ocr_pages) => Ok((ocr_pages, None)),
        Err(e) => {
            let message = format!("OCR fallback failed: {e}");
            warn!("{message}");
            let warning = ExtractionWarning {
                kind: WarningKind::OcrFallback,
                block: 0,
                message,
            };
            Ok((pages, Some(warning)))
        }
    }
}

/// Flatten, truncate and reconcile the document's lines.
pub fn prepare_lines(pages: &[PageGeometry], options: &AuditOptions) -> Vec<Fragment> {
    let raw = extraction::document_lines(pages);
    let truncated = match options.truncate_marker.as_deref() {
        Some(marker) => reconcile::truncate_at_marker(&raw, marker),
        None => raw,
    };
    reconcile::reconcile(&truncated, &options.tolerances)
}

/// Reconstruct and validate already-extracted page geometry.
pub fn audit_pages(
    pages: &[PageGeometry],
    columns: &ColumnConfigSet,
    options: &AuditOptions,
) -> Result<AuditReport, AuditError> {
    let fields = columns.fields(&options.column_key)?;
    let lines = prepare_lines(pages, options);
    let structure = parsing::locate_structure(&lines);
    let mut warnings = structure.missing_code_warnings();

    let rows = match table::reconstruct_tables(
        pages,
        &lines,
        &structure,
        fields,
        options.primary_field,
        &options.tolerances,
    ) {
        Ok(rows) => rows,
        Err(AuditError::CannotIdentifyColumns) if options.allow_fixed_stride => {
            warn!("no table columns found, falling back to fixed-stride extraction");
            legacy::extract_fixed_stride(&lines, &structure, fields, options.primary_field)
        }
        Err(e) => return Err(e),
    };

    let (blocks, block_warnings) = assemble::assemble_blocks(&lines, &structure, rows);
    warnings.extend(block_warnings);

    let totals = parsing::locate_global_totals(&lines);
    let discrepancies = validate::validate(&blocks, &totals, options.tolerances.numeric);

    let report = AuditReport {
        source: None,
        backend: String::new(),
        blocks,
        totals,
        warnings,
        discrepancies,
    };
    info!(
        blocks = report.blocks.len(),
        items = report.item_count(),
        discrepancies = report.discrepancies.len(),
        "audit complete"
    );
    Ok(report)
}
