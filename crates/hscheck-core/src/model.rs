use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A table column an invoice row can carry.
///
/// Wire names follow the column configuration files (`u11_code`,
/// `sanhua_no`, ...). Detected columns beyond the configured list become
/// `Unknown(k)` (`unknown_k`, 1-based column position) and their text is
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    FinalCustomer,
    ReferenceCode,
    CustomerNumber,
    SupplierNumber,
    Quantity,
    UnitPrice,
    Amount,
    Unknown(usize),
}

impl Field {
    pub fn from_name(name: &str) -> Option<Field> {
        let lower = name.trim().to_lowercase();
        let field = match lower.as_str() {
            "final_customers" | "final_customer" | "customer" => Field::FinalCustomer,
            "u11_code" | "reference_code" => Field::ReferenceCode,
            "customers_no" | "customer_no" | "customer_number" => Field::CustomerNumber,
            "sanhua_no" | "supplier_no" | "supplier_number" => Field::SupplierNumber,
            "quantity" | "qty" => Field::Quantity,
            "unit_price" => Field::UnitPrice,
            "amount" => Field::Amount,
            other => {
                let k = other.strip_prefix("unknown_")?.parse().ok()?;
                Field::Unknown(k)
            }
        };
        Some(field)
    }

    pub fn name(&self) -> String {
        match self {
            Field::FinalCustomer => "final_customers".into(),
            Field::ReferenceCode => "u11_code".into(),
            Field::CustomerNumber => "customers_no".into(),
            Field::SupplierNumber => "sanhua_no".into(),
            Field::Quantity => "quantity".into(),
            Field::UnitPrice => "unit_price".into(),
            Field::Amount => "amount".into(),
            Field::Unknown(k) => format!("unknown_{k}"),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Field::from_name(&value).ok_or_else(|| format!("unknown field name '{value}'"))
    }
}

impl From<Field> for String {
    fn from(field: Field) -> String {
        field.name()
    }
}

/// One table row. Values stay raw text until validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    #[serde(rename = "final_customers")]
    pub final_customer: String,
    #[serde(rename = "u11_code")]
    pub reference_code: String,
    #[serde(rename = "customers_no")]
    pub customer_number: String,
    #[serde(rename = "sanhua_no")]
    pub supplier_number: String,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
}

impl InvoiceItem {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FinalCustomer => &self.final_customer,
            Field::ReferenceCode => &self.reference_code,
            Field::CustomerNumber => &self.customer_number,
            Field::SupplierNumber => &self.supplier_number,
            Field::Quantity => &self.quantity,
            Field::UnitPrice => &self.unit_price,
            Field::Amount => &self.amount,
            Field::Unknown(_) => "",
        }
    }

    /// Append `text` to a field, space-separated from any earlier value.
    /// Returns false for unknown columns, whose text has nowhere to go.
    pub fn append(&mut self, field: Field, text: &str) -> bool {
        let slot = match field {
            Field::FinalCustomer => &mut self.final_customer,
            Field::ReferenceCode => &mut self.reference_code,
            Field::CustomerNumber => &mut self.customer_number,
            Field::SupplierNumber => &mut self.supplier_number,
            Field::Quantity => &mut self.quantity,
            Field::UnitPrice => &mut self.unit_price,
            Field::Amount => &mut self.amount,
            Field::Unknown(_) => return false,
        };
        let text = text.trim();
        if text.is_empty() {
            return true;
        }
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
        true
    }

    pub fn is_blank(&self) -> bool {
        [
            &self.final_customer,
            &self.reference_code,
            &self.customer_number,
            &self.supplier_number,
            &self.quantity,
            &self.unit_price,
            &self.amount,
        ]
        .iter()
        .all(|v| v.trim().is_empty())
    }
}

/// One goods group, opened by a "description of goods" line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBlock {
    /// Empty when the description line carried no code.
    pub hs_code: String,
    #[serde(rename = "desc_of_goods")]
    pub description: String,
    pub subtotal: String,
    #[serde(rename = "total_usd")]
    pub total_amount: String,
    pub items: Vec<InvoiceItem>,
}

/// Document-wide totals as printed on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTotals {
    /// Line following the "total:" marker.
    pub quantity: String,
    /// Final line of the (truncated) document.
    pub amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    AmountMismatch,
    SubtotalMismatch,
    TotalMismatch,
    MissingRequiredField,
    MissingCode,
    CodeMismatch,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscrepancyKind::AmountMismatch => "amount mismatch",
            DiscrepancyKind::SubtotalMismatch => "subtotal mismatch",
            DiscrepancyKind::TotalMismatch => "total mismatch",
            DiscrepancyKind::MissingRequiredField => "missing required field",
            DiscrepancyKind::MissingCode => "missing code",
            DiscrepancyKind::CodeMismatch => "code mismatch",
        };
        write!(f, "{s}")
    }
}

/// A validation or comparison finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    /// 1-based block index; 0 for document-level findings.
    pub block: usize,
    /// 1-based item index within the block; 0 when not item-scoped.
    pub item: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated: Option<String>,
    /// Spreadsheet row of the reference entry, for code comparisons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_row: Option<u32>,
    pub message: String,
}

impl Discrepancy {
    pub(crate) fn numeric(
        kind: DiscrepancyKind,
        block: usize,
        item: usize,
        expected: Decimal,
        calculated: Decimal,
        message: String,
    ) -> Self {
        Discrepancy {
            kind,
            block,
            item,
            reference_code: None,
            expected: Some(format!("{expected:.2}")),
            calculated: Some(format!("{calculated:.2}")),
            source_row: None,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingHsCode,
    SubtotalFormat,
    RowDiscarded,
    OcrFallback,
}

/// A non-fatal reconstruction problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub kind: WarningKind,
    /// 1-based block index; 0 for document-level warnings.
    pub block: usize,
    pub message: String,
}

/// Full result of one audit run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub backend: String,
    #[serde(rename = "goods_blocks")]
    pub blocks: Vec<InvoiceBlock>,
    pub totals: GlobalTotals,
    pub warnings: Vec<ExtractionWarning>,
    pub discrepancies: Vec<Discrepancy>,
}

impl AuditReport {
    pub fn item_count(&self) -> usize {
        self.blocks.iter().map(|b| b.items.len()).sum()
    }

    /// No items were reconstructed at all.
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Items were found and nothing was flagged.
    pub fn is_clean(&self) -> bool {
        !self.is_empty() && self.discrepancies.is_empty()
    }
}
