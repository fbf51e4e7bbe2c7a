// 💳 Transaction Record - Mercury transaction snapshot
// Read-only input to the template engine; the data layer fetches and
// shapes these, the engine only reads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// CORE RECORD
// ============================================================================

/// Mercury transaction as handed over by the data layer.
///
/// Serialized names are camelCase so dotted template paths like
/// `txn.categoryData.name` line up with the field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,

    /// Signed decimal amount; negative = debit
    pub amount: f64,

    /// ISO-8601 timestamp
    pub created_at: String,

    /// Mercury status vocabulary ("sent", "pending", "cancelled", ...)
    pub status: String,

    #[serde(default)]
    pub bank_description: String,

    #[serde(default)]
    pub counterparty_name: Option<String>,

    /// Transaction-type tag ("outgoingPayment", "creditCardTransaction",
    /// "other", ...)
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub mercury_category: Option<String>,

    /// Possibly `|`-delimited multi-value GL name string
    #[serde(default)]
    pub general_ledger_code_name: Option<String>,

    #[serde(default)]
    pub category_data: Option<CategoryData>,

    #[serde(default)]
    pub details: Option<Details>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryData {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    #[serde(default)]
    pub credit_card_info: Option<CreditCardInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardInfo {
    pub email: String,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub url: String,
    pub attachment_type: String,
}

impl Transaction {
    /// Serialize into a `Value` snapshot for dotted-path traversal.
    /// One snapshot is taken per template evaluation.
    pub fn to_snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// DOTTED-PATH ACCESS
// ============================================================================

/// Walk a dotted path (`categoryData.name`) through a value snapshot.
/// Numeric segments index into arrays (`attachments.0.url`).
/// A missing intermediate key is "no value", never an error.
pub fn path_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            other => other.get(key)?,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Render a snapshot value as a display string. `null` is "no value".
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(format_number(n)),
        other => Some(other.to_string()),
    }
}

/// Format a float the way the export UI displays numbers: integral values
/// print with no decimal point (`100.0` → `"100"`, `-42.5` → `"-42.5"`).
pub fn display_number(value: f64) -> String {
    // 2^53: beyond this an f64 no longer holds exact integers
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => display_number(f),
        None => n.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
