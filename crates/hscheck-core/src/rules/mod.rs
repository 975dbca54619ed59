pub mod schema;

use crate::error::AuditError;
use crate::geometry::Fragment;
use schema::{SelectedField, Selector, SelectorRules};
use std::collections::HashSet;
use std::path::Path;

/// Load selector rules from a JSON file.
pub fn load_rules(path: &Path) -> Result<SelectorRules, AuditError> {
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_rules(&content, path)
}

/// Parse selector rules from a JSON string.
pub fn parse_rules(json: &str, source: &Path) -> Result<SelectorRules, AuditError> {
    let rules: SelectorRules = serde_json::from_str(json).map_err(|e| AuditError::ConfigLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_rules(&rules)?;
    Ok(rules)
}

/// Parse selector rules from a JSON string (no file path context).
pub fn parse_rules_str(json: &str) -> Result<SelectorRules, AuditError> {
    let rules: SelectorRules = serde_json::from_str(json).map_err(AuditError::Json)?;
    validate_rules(&rules)?;
    Ok(rules)
}

/// Validate that selector rules are well-formed.
pub fn validate_rules(rules: &SelectorRules) -> Result<(), AuditError> {
    let mut seen = HashSet::new();

    for field in &rules.fields {
        if field.name.trim().is_empty() {
            return Err(AuditError::ConfigInvalid(
                "field name must not be empty".into(),
            ));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(AuditError::ConfigInvalid(format!(
                "field '{}' is defined more than once",
                field.name
            )));
        }

        let sel = &field.selector;
        if sel.page == 0 {
            return Err(AuditError::ConfigInvalid(format!(
                "field '{}': pages are numbered from 1",
                field.name
            )));
        }
        match (sel.line, sel.lines) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(AuditError::ConfigInvalid(format!(
                    "field '{}': selector needs exactly one of 'line' or 'lines'",
                    field.name
                )))
            }
            (Some(0), None) => {
                return Err(AuditError::ConfigInvalid(format!(
                    "field '{}': lines are numbered from 1",
                    field.name
                )))
            }
            (None, Some([start, end])) if start == 0 || start > end => {
                return Err(AuditError::ConfigInvalid(format!(
                    "field '{}': invalid line range [{start}, {end}]",
                    field.name
                )))
            }
            _ => {}
        }
    }

    Ok(())
}

/// Read every rule's field from the reconciled lines, in rule order.
pub fn extract_by_rules(lines: &[Fragment], rules: &SelectorRules) -> Vec<SelectedField> {
    rules
        .fields
        .iter()
        .map(|field| SelectedField {
            name: field.name.clone(),
            value: select(lines, &field.selector),
        })
        .collect()
}

fn select(lines: &[Fragment], selector: &Selector) -> Option<String> {
    let mut on_page = lines.iter().filter(|l| l.page_number == selector.page);
    match (selector.line, selector.lines) {
        (Some(n), _) => on_page.find(|l| l.index == n).map(|l| l.text.clone()),
        (None, Some([start, end])) => {
            let matched: Vec<&str> = on_page
                .filter(|l| (start..=end).contains(&l.index))
                .map(|l| l.text.as_str())
                .collect();
            if matched.is_empty() {
                None
            } else {
                Some(matched.join(selector.join.as_deref().unwrap_or(" ")))
            }
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    fn doc() -> Vec<Fragment> {
        let mut out = Vec::new();
        for page in 1..=2 {
            for i in 1..=4 {
                let y = i as f32 * 20.0;
                out.push(Fragment::new(
                    page,
                    i,
                    format!("p{page} l{i}"),
                    BBox::new(20.0, y, 80.0, y + 10.0).unwrap(),
                ));
            }
        }
        out
    }

    #[test]
    fn test_parse_valid_rules() {
        let json = r#"{
            "fields": [
                { "name": "invoice_number", "selector": { "page": 1, "line": 2 } },
                { "name": "ship_to", "selector": { "page": 2, "lines": [2, 3], "join": "\n" } }
            ]
        }"#;
        let rules = parse_rules_str(json).unwrap();
        assert_eq!(rules.fields.len(), 2);
        assert_eq!(rules.fields[1].selector.lines, Some([2, 3]));
    }

    #[test]
    fn test_extract_by_rules() {
        let json = r#"{
            "fields": [
                { "name": "single", "selector": { "line": 2 } },
                { "name": "range", "selector": { "page": 2, "lines": [2, 3] } },
                { "name": "joined", "selector": { "page": 2, "lines": [1, 2], "join": "|" } },
                { "name": "missing", "selector": { "page": 3, "line": 1 } }
            ]
        }"#;
        let rules = parse_rules_str(json).unwrap();
        let values: Vec<Option<String>> = extract_by_rules(&doc(), &rules)
            .into_iter()
            .map(|f| f.value)
            .collect();
        assert_eq!(
            values,
            vec![
                Some("p1 l2".to_string()),
                Some("p2 l2 p2 l3".to_string()),
                Some("p2 l1|p2 l2".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        for json in [
            r#"{"fields": [{"name": "a", "selector": {"page": 1}}]}"#,
            r#"{"fields": [{"name": "a", "selector": {"line": 1, "lines": [1, 2]}}]}"#,
            r#"{"fields": [{"name": "a", "selector": {"lines": [3, 2]}}]}"#,
            r#"{"fields": [{"name": "a", "selector": {"page": 0, "line": 1}}]}"#,
            r#"{"fields": [
                {"name": "a", "selector": {"line": 1}},
                {"name": "a", "selector": {"line": 2}}
            ]}"#,
            r#"{"fields": [{"name": " ", "selector": {"line": 1}}]}"#,
        ] {
            assert!(parse_rules_str(json).is_err(), "{json}");
        }
    }
}
