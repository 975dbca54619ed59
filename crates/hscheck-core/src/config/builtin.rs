use crate::config::{parse_column_config_str, ColumnConfigSet};
use crate::error::AuditError;

const DEFAULT_COLUMNS_JSON: &str = include_str!("../../../../config/columns.json");

/// Key of the built-in layout.
pub const DEFAULT_KEY: &str = "default";

/// The built-in column layouts shipped with the tool.
pub fn default_columns() -> Result<ColumnConfigSet, AuditError> {
    parse_column_config_str(DEFAULT_COLUMNS_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn test_default_layout_has_seven_columns() {
        let config = default_columns().unwrap();
        let fields = config.fields(DEFAULT_KEY).unwrap();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[1], Field::ReferenceCode);
        assert_eq!(fields[6], Field::Amount);
    }
}
