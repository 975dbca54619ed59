use hscheck_core::error::AuditError;
use hscheck_core::geometry::Fragment;
use hscheck_core::model::AuditReport;
use hscheck_core::rules::schema::SelectedField;

pub fn print_report(report: &AuditReport) -> Result<(), AuditError> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}

pub fn print_selected(fields: &[SelectedField]) -> Result<(), AuditError> {
    let json = serde_json::to_string_pretty(fields)?;
    println!("{json}");
    Ok(())
}

pub fn print_lines(lines: &[Fragment]) -> Result<(), AuditError> {
    let json = serde_json::to_string_pretty(lines)?;
    println!("{json}");
    Ok(())
}
