//! Fixed-stride item extraction for documents without usable table geometry.
//!
//! Only used when explicitly enabled: items are read as runs of consecutive
//! lines, one line per configured field, which breaks as soon as a cell
//! wraps or is empty.

use tracing::{debug, info};

use crate::geometry::Fragment;
use crate::model::{Field, InvoiceItem};
use crate::parsing::normalize::clean_text;
use crate::parsing::DocumentStructure;
use crate::table::BlockRows;

/// Split "NAME 12345" into two lines when the last token is all digits and
/// the rest contains a letter.
fn split_trailing_number(line: &str) -> Option<(String, String)> {
    let (before, after) = line.trim().rsplit_once(' ')?;
    let before = before.trim();
    let after = after.trim();
    let is_number = !after.is_empty() && after.chars().all(|c| c.is_ascii_digit());
    if is_number && before.chars().any(char::is_alphabetic) {
        Some((before.to_string(), after.to_string()))
    } else {
        None
    }
}

fn plausible_code(code: &str) -> bool {
    code.chars().any(char::is_alphanumeric) && code.chars().count() > 3
}

/// Read items from each block's lines with a stride of `fields.len()`.
pub fn extract_fixed_stride(
    lines: &[Fragment],
    structure: &DocumentStructure,
    fields: &[Field],
    primary: Field,
) -> Vec<BlockRows> {
    let stride = fields.len();
    info!(stride, "using fixed-stride extraction");

    structure
        .block_spans(lines.len())
        .iter()
        .enumerate()
        .map(|(b, span)| {
            let mut texts: Vec<String> = lines
                .get(span.opening + 1..span.end)
                .unwrap_or_default()
                .iter()
                .map(|l| l.text.trim().to_string())
                .collect();
            let mut items = Vec::new();
            let mut i = 0;

            while stride > 0 && i < texts.len() {
                if let Some((before, after)) = split_trailing_number(&texts[i]) {
                    debug!(block = b + 1, "split '{}' before a trailing number", texts[i]);
                    texts[i] = before;
                    texts.insert(i + 1, after);
                }
                if i + stride > texts.len() {
                    break;
                }

                let mut item = InvoiceItem::default();
                for (field, text) in fields.iter().zip(&texts[i..i + stride]) {
                    item.append(*field, text);
                }
                item.final_customer = clean_text(&item.final_customer);

                let first = fields.first().map(|f| item.get(*f)).unwrap_or_default();
                if !first.is_empty() && plausible_code(item.get(primary)) {
                    items.push(item);
                    i += stride;
                } else {
                    i += 1;
                }
            }

            BlockRows {
                items,
                warnings: Vec::new(),
            }
        })
        .collect()
}
