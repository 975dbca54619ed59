//! Arithmetic consistency checks over reconstructed blocks.
//!
//! Per block, in order: required fields for every item, then every item's
//! amount, then the block subtotal and total. Document totals come last.
//! Every check runs; nothing short-circuits.

pub mod compare;

use rust_decimal::Decimal;
use tracing::debug;

use crate::model::{Discrepancy, DiscrepancyKind, GlobalTotals, InvoiceBlock, InvoiceItem};
use crate::parsing::values::parse_number;

/// Run every check and return the findings in document order.
pub fn validate(
    blocks: &[InvoiceBlock],
    totals: &GlobalTotals,
    tolerance: Decimal,
) -> Vec<Discrepancy> {
    let mut out = Vec::new();

    for (b, block) in blocks.iter().enumerate() {
        let block_no = b + 1;
        check_required_fields(block, block_no, &mut out);
        check_item_amounts(block, block_no, tolerance, &mut out);
        check_block_sums(block, block_no, tolerance, &mut out);
    }
    check_global_sums(blocks, totals, tolerance, &mut out);

    debug!(discrepancies = out.len(), "validation complete");
    out
}

fn exceeds(calculated: Decimal, expected: Decimal, tolerance: Decimal) -> bool {
    calculated.saturating_sub(expected).abs() > tolerance
}

fn item_label(item: &InvoiceItem) -> &str {
    if item.reference_code.trim().is_empty() {
        "N/A"
    } else {
        item.reference_code.trim()
    }
}

fn reference_code(item: &InvoiceItem) -> Option<String> {
    let code = item.reference_code.trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn check_required_fields(block: &InvoiceBlock, block_no: usize, out: &mut Vec<Discrepancy>) {
    for (i, item) in block.items.iter().enumerate() {
        if item.quantity.trim().is_empty() {
            out.push(Discrepancy {
                kind: DiscrepancyKind::MissingRequiredField,
                block: block_no,
                item: i + 1,
                reference_code: reference_code(item),
                expected: None,
                calculated: None,
                source_row: None,
                message: format!(
                    "Block {block_no} (HS Code '{}'), Item {} ({}): quantity is required but empty",
                    block.hs_code,
                    i + 1,
                    item_label(item)
                ),
            });
        }
    }
}

/// `unit_price * quantity` against `amount`, zero quantities included.
fn check_item_amounts(
    block: &InvoiceBlock,
    block_no: usize,
    tolerance: Decimal,
    out: &mut Vec<Discrepancy>,
) {
    for (i, item) in block.items.iter().enumerate() {
        let quantity = parse_number(&item.quantity);
        let unit_price = parse_number(&item.unit_price);
        let amount = parse_number(&item.amount);
        let calculated = unit_price.saturating_mul(quantity);

        if exceeds(calculated, amount, tolerance) {
            let mut d = Discrepancy::numeric(
                DiscrepancyKind::AmountMismatch,
                block_no,
                i + 1,
                amount,
                calculated,
                format!(
                    "Block {block_no} (HS Code '{}'), Item {} ({}): amount mismatch, expected {amount:.2}, calculated {calculated:.2} (quantity={quantity}, unit_price={unit_price})",
                    block.hs_code,
                    i + 1,
                    item_label(item)
                ),
            );
            d.reference_code = reference_code(item);
            out.push(d);
        }
    }
}

fn check_block_sums(
    block: &InvoiceBlock,
    block_no: usize,
    tolerance: Decimal,
    out: &mut Vec<Discrepancy>,
) {
    let quantity_sum = block
        .items
        .iter()
        .fold(Decimal::ZERO, |acc, item| acc.saturating_add(parse_number(&item.quantity)));
    let amount_sum = block
        .items
        .iter()
        .fold(Decimal::ZERO, |acc, item| acc.saturating_add(parse_number(&item.amount)));
    let subtotal = parse_number(&block.subtotal);
    let total = parse_number(&block.total_amount);

    if exceeds(quantity_sum, subtotal, tolerance) {
        out.push(Discrepancy::numeric(
            DiscrepancyKind::SubtotalMismatch,
            block_no,
            0,
            subtotal,
            quantity_sum,
            format!(
                "Block {block_no} (HS Code '{}'): subtotal mismatch, expected {subtotal:.2}, calculated {quantity_sum:.2}",
                block.hs_code
            ),
        ));
    }
    if exceeds(amount_sum, total, tolerance) {
        out.push(Discrepancy::numeric(
            DiscrepancyKind::TotalMismatch,
            block_no,
            0,
            total,
            amount_sum,
            format!(
                "Block {block_no} (HS Code '{}'): total mismatch, expected {total:.2}, calculated {amount_sum:.2}",
                block.hs_code
            ),
        ));
    }
}

/// Printed block subtotals and totals against the document totals.
fn check_global_sums(
    blocks: &[InvoiceBlock],
    totals: &GlobalTotals,
    tolerance: Decimal,
    out: &mut Vec<Discrepancy>,
) {
    let subtotal_sum = blocks
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc.saturating_add(parse_number(&b.subtotal)));
    let total_sum = blocks
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc.saturating_add(parse_number(&b.total_amount)));
    let expected_quantity = parse_number(&totals.quantity);
    let expected_amount = parse_number(&totals.amount);

    if exceeds(subtotal_sum, expected_quantity, tolerance) {
        out.push(Discrepancy::numeric(
            DiscrepancyKind::SubtotalMismatch,
            0,
            0,
            expected_quantity,
            subtotal_sum,
            format!(
                "Global total quantity mismatch, expected {expected_quantity:.2}, calculated {subtotal_sum:.2}"
            ),
        ));
    }
    if exceeds(total_sum, expected_amount, tolerance) {
        out.push(Discrepancy::numeric(
            DiscrepancyKind::TotalMismatch,
            0,
            0,
            expected_amount,
            total_sum,
            format!(
                "Global total USD mismatch, expected {expected_amount:.2}, calculated {total_sum:.2}"
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(code: &str, quantity: &str, unit_price: &str, amount: &str) -> InvoiceItem {
        InvoiceItem {
            reference_code: code.into(),
            quantity: quantity.into(),
            unit_price: unit_price.into(),
            amount: amount.into(),
            ..Default::default()
        }
    }

    fn block(items: Vec<InvoiceItem>, subtotal: &str, total: &str) -> InvoiceBlock {
        InvoiceBlock {
            hs_code: "8481.80".into(),
            description: "VALVE".into(),
            subtotal: subtotal.into(),
            total_amount: total.into(),
            items,
        }
    }

    fn kinds(found: &[Discrepancy]) -> Vec<(DiscrepancyKind, usize, usize)> {
        found.iter().map(|d| (d.kind, d.block, d.item)).collect()
    }

    #[test]
    fn test_consistent_document_is_clean() {
        let blocks = vec![block(
            vec![
                item("U11-001", "100PCS", "$1.50", "150.00"),
                item("U11-002", "50PCS", "3.00", "150.00"),
            ],
            "150PCS",
            "USD 300.00",
        )];
        let totals = GlobalTotals {
            quantity: "150PCS".into(),
            amount: "USD300.00".into(),
        };
        assert!(validate(&blocks, &totals, dec!(0.01)).is_empty());
    }

    #[test]
    fn test_tolerance_boundary_is_exact() {
        let within = vec![block(vec![item("A", "1", "10.00", "10.01")], "1", "10.01")];
        let totals = GlobalTotals {
            quantity: "1".into(),
            amount: "10.01".into(),
        };
        assert!(validate(&within, &totals, dec!(0.01)).is_empty());

        let beyond = vec![block(vec![item("A", "1", "10.00", "10.011")], "1", "10.011")];
        let totals = GlobalTotals {
            quantity: "1".into(),
            amount: "10.011".into(),
        };
        let found = validate(&beyond, &totals, dec!(0.01));
        assert_eq!(kinds(&found), vec![(DiscrepancyKind::AmountMismatch, 1, 1)]);
        assert_eq!(found[0].expected.as_deref(), Some("10.01"));
        assert_eq!(found[0].calculated.as_deref(), Some("10.00"));
    }

    #[test]
    fn test_empty_quantity_is_required_even_when_amounts_are_zero() {
        let blocks = vec![block(vec![item("U11-009", "", "0", "0")], "0", "0")];
        let found = validate(&blocks, &GlobalTotals::default(), dec!(0.01));
        assert_eq!(kinds(&found), vec![(DiscrepancyKind::MissingRequiredField, 1, 1)]);
        assert_eq!(found[0].reference_code.as_deref(), Some("U11-009"));
    }

    #[test]
    fn test_zero_quantity_still_checks_amount() {
        let blocks = vec![block(vec![item("A", "", "2.00", "5.00")], "0", "5.00")];
        let totals = GlobalTotals {
            quantity: "0".into(),
            amount: "5.00".into(),
        };
        let found = validate(&blocks, &totals, dec!(0.01));
        assert_eq!(
            kinds(&found),
            vec![
                (DiscrepancyKind::MissingRequiredField, 1, 1),
                (DiscrepancyKind::AmountMismatch, 1, 1),
            ]
        );
    }

    #[test]
    fn test_ordering_across_levels() {
        let blocks = vec![
            block(vec![item("A", "", "1", "1"), item("B", "2", "1", "3")], "9", "9"),
            block(vec![item("C", "1", "1", "1")], "1", "1"),
        ];
        let totals = GlobalTotals {
            quantity: "100".into(),
            amount: "10".into(),
        };
        let found = validate(&blocks, &totals, dec!(0.01));
        assert_eq!(
            kinds(&found),
            vec![
                (DiscrepancyKind::MissingRequiredField, 1, 1),
                (DiscrepancyKind::AmountMismatch, 1, 1),
                (DiscrepancyKind::AmountMismatch, 1, 2),
                (DiscrepancyKind::SubtotalMismatch, 1, 0),
                (DiscrepancyKind::TotalMismatch, 1, 0),
                (DiscrepancyKind::SubtotalMismatch, 0, 0),
            ]
        );
    }
}
