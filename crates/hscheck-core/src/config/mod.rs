pub mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::AuditError;
use crate::model::Field;

/// Named column layouts: configuration key -> table fields in header order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnConfigSet {
    layouts: BTreeMap<String, Vec<Field>>,
}

impl ColumnConfigSet {
    /// Fields for `key`. A missing key aborts reconstruction.
    pub fn fields(&self, key: &str) -> Result<&[Field], AuditError> {
        self.layouts
            .get(key)
            .map(|v| v.as_slice())
            .ok_or_else(|| AuditError::ColumnConfigMissing {
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(|k| k.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, fields: Vec<Field>) {
        self.layouts.insert(key.into(), fields);
    }
}

/// Load a column configuration from a JSON file.
pub fn load_column_config(path: &Path) -> Result<ColumnConfigSet, AuditError> {
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_column_config(&content, path)
}

/// Parse a column configuration from a JSON string.
pub fn parse_column_config(json: &str, source: &Path) -> Result<ColumnConfigSet, AuditError> {
    let config: ColumnConfigSet =
        serde_json::from_str(json).map_err(|e| AuditError::ConfigLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_column_config(&config)?;
    Ok(config)
}

/// Parse a column configuration from a JSON string (no file path context).
pub fn parse_column_config_str(json: &str) -> Result<ColumnConfigSet, AuditError> {
    let config: ColumnConfigSet = serde_json::from_str(json).map_err(AuditError::Json)?;
    validate_column_config(&config)?;
    Ok(config)
}

/// Validate that every layout is usable for reconstruction.
pub fn validate_column_config(config: &ColumnConfigSet) -> Result<(), AuditError> {
    if config.layouts.is_empty() {
        return Err(AuditError::ConfigInvalid(
            "column configuration defines no layouts".into(),
        ));
    }

    for (key, fields) in &config.layouts {
        if fields.is_empty() {
            return Err(AuditError::ConfigInvalid(format!(
                "layout '{key}' has no columns"
            )));
        }

        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field) {
                return Err(AuditError::ConfigInvalid(format!(
                    "layout '{key}' lists column '{field}' more than once"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let json = r#"{ "default": ["final_customers", "u11_code", "quantity"] }"#;
        let config = parse_column_config_str(json).unwrap();
        assert_eq!(
            config.fields("default").unwrap(),
            &[Field::FinalCustomer, Field::ReferenceCode, Field::Quantity]
        );
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let config = parse_column_config_str(r#"{ "default": ["amount"] }"#).unwrap();
        assert!(matches!(
            config.fields("wide"),
            Err(AuditError::ColumnConfigMissing { ref key }) if key == "wide"
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(parse_column_config_str(r#"{ "default": ["colour"] }"#).is_err());
    }

    #[test]
    fn test_empty_and_duplicate_layouts_rejected() {
        assert!(parse_column_config_str(r#"{ "default": [] }"#).is_err());
        assert!(parse_column_config_str(r#"{}"#).is_err());
        assert!(parse_column_config_str(r#"{ "default": ["amount", "amount"] }"#).is_err());
    }

    #[test]
    fn test_file_errors_carry_path() {
        let err = load_column_config(Path::new("/nonexistent/columns.json")).unwrap_err();
        assert!(matches!(err, AuditError::ConfigLoad { .. }));
    }
}
