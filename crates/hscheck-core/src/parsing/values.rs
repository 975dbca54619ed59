use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d,]+\.?\d*").expect("static regex"));

/// Sum every comma-grouped number found in free text.
///
/// Handles formats like:
/// - "$1,234.56" -> 1234.56
/// - "100PCS" -> 100
/// - "7344PCS+5768SETS" -> 13122 (compound quantities add up)
/// - "" or "N/A" -> 0
pub fn parse_number(s: &str) -> Decimal {
    NUMBER_RUN
        .find_iter(s)
        .filter_map(|m| {
            let cleaned = m.as_str().replace(',', "");
            let cleaned = cleaned.trim_end_matches('.');
            if cleaned.is_empty() {
                None
            } else {
                Decimal::from_str(cleaned).ok()
            }
        })
        .fold(Decimal::ZERO, |acc, n| acc.saturating_add(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compound_quantity_sums() {
        assert_eq!(parse_number("7344PCS+5768SETS"), dec!(13122));
        assert_eq!(parse_number("7344PCS+5768SETS+512SMETAS"), dec!(13624));
    }

    #[test]
    fn test_currency_with_grouping() {
        assert_eq!(parse_number("$1,234.56"), dec!(1234.56));
        assert_eq!(parse_number("USD 12,000"), dec!(12000));
    }

    #[test]
    fn test_empty_and_non_numeric() {
        assert_eq!(parse_number(""), Decimal::ZERO);
        assert_eq!(parse_number("N/A"), Decimal::ZERO);
        assert_eq!(parse_number(",,"), Decimal::ZERO);
    }

    #[test]
    fn test_trailing_dot() {
        assert_eq!(parse_number("100."), dec!(100));
    }

    #[test]
    fn test_oversized_run_is_ignored() {
        assert_eq!(parse_number("999999999999999999999999999999999 5"), dec!(5));
    }
}
