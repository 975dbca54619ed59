use tracing::{info, warn};

use crate::extraction::reference::ReferenceMapping;
use crate::model::{Discrepancy, DiscrepancyKind, InvoiceBlock};

fn normalize_code(code: &str, strip_dots: bool) -> String {
    let code = code.trim();
    if strip_dots {
        code.replace('.', "")
    } else {
        code.to_string()
    }
}

/// Check every item's block code against the reference mapping.
///
/// An item whose reference code is missing from the mapping yields
/// `MissingCode`; a different expected code yields `CodeMismatch`. With
/// `normalize`, dots are ignored ("8481.80" equals "848180").
pub fn compare_codes(
    blocks: &[InvoiceBlock],
    mapping: &ReferenceMapping,
    normalize: bool,
) -> Vec<Discrepancy> {
    let mut out = Vec::new();

    for (b, block) in blocks.iter().enumerate() {
        let block_no = b + 1;
        for (i, item) in block.items.iter().enumerate() {
            let item_no = i + 1;
            let code = item.reference_code.trim();
            if code.is_empty() {
                warn!("block {block_no} item {item_no} has no reference code");
                continue;
            }

            let Some(entry) = mapping.get(code) else {
                warn!("'{code}' not found in reference mapping (block {block_no}, item {item_no})");
                out.push(Discrepancy {
                    kind: DiscrepancyKind::MissingCode,
                    block: block_no,
                    item: item_no,
                    reference_code: Some(code.to_string()),
                    expected: None,
                    calculated: Some(block.hs_code.clone()),
                    source_row: None,
                    message: format!(
                        "'{code}' (block {block_no}, item {item_no}, HS code '{}') not found in reference mapping",
                        block.hs_code
                    ),
                });
                continue;
            };

            if normalize_code(&block.hs_code, normalize)
                != normalize_code(&entry.expected_code, normalize)
            {
                let message = format!(
                    "'{code}' (block {block_no}, item {item_no}): HS code '{}' differs from '{}' at reference row {}",
                    block.hs_code, entry.expected_code, entry.source_row
                );
                warn!("{message}");
                out.push(Discrepancy {
                    kind: DiscrepancyKind::CodeMismatch,
                    block: block_no,
                    item: item_no,
                    reference_code: Some(code.to_string()),
                    expected: Some(entry.expected_code.clone()),
                    calculated: Some(block.hs_code.clone()),
                    source_row: Some(entry.source_row),
                    message,
                });
            }
        }
    }

    info!(findings = out.len(), "code comparison complete");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::reference::ReferenceEntry;
    use crate::model::InvoiceItem;

    fn mapping() -> ReferenceMapping {
        let mut m = ReferenceMapping::new();
        m.insert(
            "U11-001".into(),
            ReferenceEntry {
                expected_code: "848180".into(),
                source_row: 2,
            },
        );
        m.insert(
            "U11-002".into(),
            ReferenceEntry {
                expected_code: "8415.90".into(),
                source_row: 3,
            },
        );
        m
    }

    fn blocks() -> Vec<InvoiceBlock> {
        let item = |code: &str| InvoiceItem {
            reference_code: code.into(),
            ..Default::default()
        };
        vec![InvoiceBlock {
            hs_code: "8481.80".into(),
            items: vec![item("U11-001"), item("U11-002"), item(""), item("U11-404")],
            ..Default::default()
        }]
    }

    #[test]
    fn test_compare_normalized() {
        let found = compare_codes(&blocks(), &mapping(), true);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, DiscrepancyKind::CodeMismatch);
        assert_eq!(found[0].item, 2);
        assert_eq!(found[0].source_row, Some(3));
        assert_eq!(found[0].expected.as_deref(), Some("8415.90"));
        assert_eq!(found[1].kind, DiscrepancyKind::MissingCode);
        assert_eq!(found[1].item, 4);
    }

    #[test]
    fn test_compare_exact_keeps_dots() {
        let found = compare_codes(&blocks(), &mapping(), false);
        let mismatches: Vec<usize> = found
            .iter()
            .filter(|d| d.kind == DiscrepancyKind::CodeMismatch)
            .map(|d| d.item)
            .collect();
        assert_eq!(mismatches, vec![1, 2]);
    }
}
