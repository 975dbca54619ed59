use hscheck_core::error::AuditError;
use std::path::{Path, PathBuf};

use super::{audit_file, emit_report, PipelineArgs};

pub fn run(
    pdf_file: &Path,
    pipeline: &PipelineArgs,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<bool, AuditError> {
    let report = audit_file(pdf_file, pipeline)?;
    emit_report(&report, output_format, output_file)
}
