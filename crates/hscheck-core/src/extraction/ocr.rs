use crate::error::AuditError;
use crate::extraction::OcrEngine;
use std::io::Write;
use std::process::Command;
use tracing::{debug, warn};

/// OCR backend shelling out to `ocrmypdf --skip-text`.
///
/// Pages that already carry text are left untouched.
pub struct OcrmypdfEngine;

impl OcrmypdfEngine {
    pub fn new() -> Self {
        OcrmypdfEngine
    }

    pub fn is_available() -> bool {
        Command::new("ocrmypdf")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for OcrmypdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// How an ocrmypdf exit code is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    Success,
    /// Output was written but ocrmypdf reported a problem.
    Warning,
    Failure,
}

/// Exit codes 1-3 are hard failures (bad arguments, input or missing
/// dependency); higher codes still produce a usable output file.
pub fn classify_exit(code: Option<i32>) -> ExitDisposition {
    match code {
        Some(0) => ExitDisposition::Success,
        Some(c) if c >= 4 => ExitDisposition::Warning,
        _ => ExitDisposition::Failure,
    }
}

impl OcrEngine for OcrmypdfEngine {
    fn ocr(&self, pdf_bytes: &[u8], language: &str) -> Result<Vec<u8>, AuditError> {
        let mut input =
            tempfile::NamedTempFile::new().map_err(|e| AuditError::OcrFailed(e.to_string()))?;
        input
            .write_all(pdf_bytes)
            .map_err(|e| AuditError::OcrFailed(e.to_string()))?;
        let output_file =
            tempfile::NamedTempFile::new().map_err(|e| AuditError::OcrFailed(e.to_string()))?;

        let output = Command::new("ocrmypdf")
            .arg("--skip-text")
            .arg("-l")
            .arg(language)
            .arg(input.path())
            .arg(output_file.path())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AuditError::OcrFailed("ocrmypdf not found on PATH".into())
                } else {
                    AuditError::OcrFailed(e.to_string())
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("ocrmypdf stderr: {}", stderr.chars().take(2000).collect::<String>());

        match classify_exit(output.status.code()) {
            ExitDisposition::Success => {}
            ExitDisposition::Warning => warn!(
                code = output.status.code(),
                "ocrmypdf completed with warnings, continuing"
            ),
            ExitDisposition::Failure => {
                return Err(AuditError::OcrFailed(format!(
                    "ocrmypdf exited with {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                )))
            }
        }

        let bytes = std::fs::read(output_file.path())?;
        if bytes.is_empty() {
            return Err(AuditError::OcrFailed("ocrmypdf produced no output".into()));
        }
        Ok(bytes)
    }

    fn backend_name(&self) -> &str {
        "ocrmypdf"
    }
}
