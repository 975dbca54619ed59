use serde::{Deserialize, Serialize};

/// Named fields read from fixed page/line positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorRules {
    pub fields: Vec<FieldRule>,
}

/// One named field and where to read it from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    pub selector: Selector,
}

/// A 1-based page with either a single 1-based line or an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<[usize; 2]>,
    /// Separator for line ranges (default a single space).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
}

fn first_page() -> usize {
    1
}

/// Value read for one rule; `None` when the selector matched no line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedField {
    pub name: String,
    pub value: Option<String>,
}
