use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AuditError;

pub const DEFAULT_ITEM_COLUMN: &str = "Item";
/// The trailing space is part of the header as it appears in the workbooks.
pub const DEFAULT_CODE_COLUMN: &str = "HScode USA ";

/// Expected code for one reference item, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub expected_code: String,
    /// 1-based spreadsheet row; the header is row 1.
    pub source_row: u32,
}

/// Reference code -> expected tariff code.
pub type ReferenceMapping = BTreeMap<String, ReferenceEntry>;

/// Read the item/code mapping from the first sheet of an xlsx workbook.
///
/// Header cells are matched by exact name. Rows with a blank item or code
/// are skipped; a repeated item overwrites the earlier row.
pub fn load_reference_xlsx(
    bytes: &[u8],
    item_col: &str,
    code_col: &str,
) -> Result<ReferenceMapping, AuditError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
        .map_err(|e| AuditError::ReferenceLoad(format!("failed to open xlsx: {e}")))?;

    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AuditError::ReferenceLoad("workbook has no sheets".into()))?
        .map_err(|e| AuditError::ReferenceLoad(format!("failed to read first sheet: {e}")))?;

    let first_row = sheet.start().map(|(row, _)| row).unwrap_or(0);
    mapping_from_rows(sheet.rows(), first_row, item_col, code_col)
}

/// Build the mapping from sheet rows, the first of which is the header.
/// `first_row` is the 0-based sheet row of the header.
pub fn mapping_from_rows<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
    first_row: u32,
    item_col: &str,
    code_col: &str,
) -> Result<ReferenceMapping, AuditError> {
    let header: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(|c| cell_as_string(c).unwrap_or_default()).collect())
        .unwrap_or_default();
    let find = |name: &str| {
        header.iter().position(|h| h == name).ok_or_else(|| {
            AuditError::ReferenceLoad(format!(
                "column '{name}' not found. Available columns: {header:?}"
            ))
        })
    };
    let item_idx = find(item_col)?;
    let code_idx = find(code_col)?;

    let mut mapping = ReferenceMapping::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for (offset, row) in rows.enumerate() {
        let source_row = first_row + offset as u32 + 2;
        let item = row.get(item_idx).and_then(cell_as_string);
        let code = row.get(code_idx).and_then(cell_as_string);
        let (Some(item), Some(code)) = (item, code) else {
            skipped += 1;
            continue;
        };

        if let Some(previous) = mapping.get(&item) {
            warn!(
                "item '{item}' repeats at row {source_row}, overwriting row {}",
                previous.source_row
            );
            duplicates += 1;
        }
        mapping.insert(
            item,
            ReferenceEntry {
                expected_code: code,
                source_row,
            },
        );
    }

    info!(
        entries = mapping.len(),
        skipped, duplicates, "reference mapping loaded"
    );
    Ok(mapping)
}

fn cell_as_string(cell: &Data) -> Option<String> {
    let s = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Empty | Data::Error(_) => return None,
        other => format!("{other}").trim().to_string(),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
