// 🧾 CSV Export Definitions - QuickBooks & Mercury field mappings
// Classifies which export a transaction belongs to and renders rows of
// cell values through the template engine. Cell values only: escaping and
// file writing belong to the caller.

use anyhow::{Context as AnyhowContext, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::TemplateError;
use crate::ledger::LedgerContext;
use crate::template::process_template;
use crate::transaction::{display_number, Transaction};

/// Statuses eligible for the QuickBooks exports
pub const QUICKBOOKS_EXPORTABLE_STATUSES: [&str; 2] = ["sent", "pending"];

// ============================================================================
// EXPORT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportType {
    MercuryTransactions,
    QuickBooksDeposits,
    QuickBooksChecks,
    QuickBooksCreditCard,
}

impl ExportType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            ExportType::MercuryTransactions => "Mercury Transactions",
            ExportType::QuickBooksDeposits => "QuickBooks Deposits",
            ExportType::QuickBooksChecks => "QuickBooks Checks",
            ExportType::QuickBooksCreditCard => "QuickBooks Credit Card",
        }
    }

    /// Short code used in filenames and mapping rows
    pub fn code(&self) -> &str {
        match self {
            ExportType::MercuryTransactions => "mercury-transactions",
            ExportType::QuickBooksDeposits => "quickbooks-deposits",
            ExportType::QuickBooksChecks => "quickbooks-checks",
            ExportType::QuickBooksCreditCard => "quickbooks-credit-card",
        }
    }

    /// Parse a short code back into an export type
    pub fn from_code(code: &str) -> Option<ExportType> {
        match code {
            "mercury-transactions" => Some(ExportType::MercuryTransactions),
            "quickbooks-deposits" => Some(ExportType::QuickBooksDeposits),
            "quickbooks-checks" => Some(ExportType::QuickBooksChecks),
            "quickbooks-credit-card" => Some(ExportType::QuickBooksCreditCard),
            _ => None,
        }
    }
}

// ============================================================================
// CLASSIFICATION PREDICATES
// ============================================================================

fn has_exportable_status(txn: &Transaction) -> bool {
    QUICKBOOKS_EXPORTABLE_STATUSES.contains(&txn.status.as_str())
}

/// IO AUTOPAY credits land as positive "other" transactions; they are
/// credit-card bill movements, not deposits or withdrawals.
fn is_io_autopay_credit(txn: &Transaction) -> bool {
    txn.kind == "other" && txn.bank_description.contains("IO AUTOPAY") && txn.amount > 0.0
}

pub fn is_withdrawal_transaction(txn: &Transaction) -> bool {
    if !has_exportable_status(txn) {
        return false;
    }
    if txn.kind == "outgoingPayment" {
        return true;
    }
    if txn.kind == "creditCardTransaction" {
        return false;
    }
    if is_io_autopay_credit(txn) {
        return false;
    }
    txn.amount < 0.0
}

pub fn is_deposit_transaction(txn: &Transaction) -> bool {
    if !has_exportable_status(txn) {
        return false;
    }
    if is_io_autopay_credit(txn) {
        return false;
    }
    if txn.kind == "outgoingPayment" || txn.kind == "creditCardTransaction" {
        return false;
    }
    txn.amount > 0.0
}

pub fn is_credit_card_transaction(txn: &Transaction) -> bool {
    if !has_exportable_status(txn) {
        return false;
    }
    if txn.kind == "other" || txn.kind == "outgoingPayment" {
        return false;
    }
    txn.kind == "creditCardTransaction"
}

/// Does this transaction belong to the given export?
pub fn matches_export(txn: &Transaction, export_type: ExportType) -> bool {
    match export_type {
        ExportType::MercuryTransactions => true,
        ExportType::QuickBooksDeposits => is_deposit_transaction(txn),
        ExportType::QuickBooksChecks => is_withdrawal_transaction(txn),
        ExportType::QuickBooksCreditCard => is_credit_card_transaction(txn),
    }
}

// ============================================================================
// CELL HELPERS
// ============================================================================

/// Multi-account GL names arrive `|`-delimited; QuickBooks wants commas.
pub fn normalize_gl_code(gl_code: Option<&str>) -> String {
    match gl_code {
        Some(code) if code.contains('|') => code.split('|').collect::<Vec<_>>().join(","),
        Some(code) => code.to_string(),
        None => String::new(),
    }
}

/// en-US date column (`M/D/YYYY`) from the ISO-8601 `createdAt`.
/// Unparseable timestamps render as an empty cell.
pub fn format_export_date(created_at: &str) -> String {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(dt) => dt.format("%-m/%-d/%Y").to_string(),
        Err(_) => String::new(),
    }
}

/// QuickBooks amount columns are unsigned
pub fn format_abs_amount(amount: f64) -> String {
    display_number(amount.abs())
}

/// Engine variables for export columns the template language cannot
/// express itself: absolute amount, en-US date, truncated reference id,
/// and the comma-normalized GL code.
pub fn export_vars(txn: &Transaction) -> HashMap<String, String> {
    HashMap::from([
        ("amountAbs".to_string(), format_abs_amount(txn.amount)),
        ("dateLocal".to_string(), format_export_date(&txn.created_at)),
        ("refNumber".to_string(), txn.id.chars().take(8).collect()),
        (
            "glCode".to_string(),
            normalize_gl_code(txn.general_ledger_code_name.as_deref()),
        ),
    ])
}

/// Expense account for the checks export: IO AUTOPAY bill payments post
/// against the credit-card GL instead of the transaction's own GL code.
fn expense_account(txn: &Transaction, vars: &HashMap<String, String>) -> String {
    if txn.kind == "other" && txn.bank_description.contains("IO AUTOPAY") {
        vars.get("glNameMercuryCreditCard").cloned().unwrap_or_default()
    } else {
        normalize_gl_code(txn.general_ledger_code_name.as_deref())
    }
}

// ============================================================================
// FIELD MAPPINGS
// ============================================================================

/// One column of an export: CSV field name plus the template that fills it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_name: String,
    pub template: String,
}

/// Ordered column set for one export type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMapping {
    pub export_type: ExportType,
    pub fields: Vec<FieldMapping>,
}

impl ExportMapping {
    /// Load a mapping from a JSON file (per-company overrides)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read export mapping: {:?}", path.as_ref()))?;

        let mapping: ExportMapping =
            serde_json::from_str(&content).context("Failed to parse export mapping JSON")?;

        Ok(mapping)
    }

    /// Column headers, in order
    pub fn headers(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field_name.as_str()).collect()
    }

    /// Evaluate every column template to produce one row of cell values.
    ///
    /// `extra_vars` come from the caller (e.g. the company GL name
    /// settings); the per-transaction export vars are layered on top.
    pub fn render_row(
        &self,
        txn: &Transaction,
        extra_vars: &HashMap<String, String>,
        ledger: Option<&LedgerContext>,
    ) -> Result<Vec<String>, TemplateError> {
        let mut vars = extra_vars.clone();
        vars.extend(export_vars(txn));
        vars.insert(
            "expenseAccount".to_string(),
            expense_account(txn, extra_vars),
        );

        self.fields
            .iter()
            .map(|field| process_template(&field.template, txn, &vars, ledger))
            .collect()
    }
}

fn field(field_name: &str, template: &str) -> FieldMapping {
    FieldMapping {
        field_name: field_name.to_string(),
        template: template.to_string(),
    }
}

/// Default column set for each export type. These mirror the legacy
/// hardcoded layouts; companies override them with stored mappings.
pub fn default_mappings(export_type: ExportType) -> ExportMapping {
    let fields = match export_type {
        ExportType::MercuryTransactions => vec![
            field("ID", "{txn.id}"),
            field("Card Name", "{txn.details.creditCardInfo.email}"),
            field("Card Payment Method", "{txn.details.creditCardInfo.paymentMethod}"),
            field("Amount", "{txn.amount}"),
            field("Created", "{txn.createdAt}"),
            field("Status", "{txn.status}"),
            field("Counterparty Name", "{txn.counterpartyName}"),
            field("Bank Description", "{txn.bankDescription}"),
            field("Kind", "{txn.kind}"),
            field("Category", "{txn.categoryData.name}"),
            field("Mercury Category", "{txn.mercuryCategory}"),
            field("GL Code", "{txn.generalLedgerCodeName}"),
            field("Attachments", "{txn.attachments.0.url}"),
        ],
        ExportType::QuickBooksDeposits => vec![
            field("Deposit To", "{glNameMercuryChecking}"),
            field("Date", "{dateLocal}"),
            field("Memo", "{concat(txn.bankDescription, \" - \", txn.categoryData.name)}"),
            field("Received From", "{txn.counterpartyName}"),
            field("From Account", "{glCode}"),
            field("Line Memo", "{txn.bankDescription}"),
            field("Check No.", ""),
            field("Payment Method", "{txn.kind}"),
            field("Class", ""),
            field("Amount", "{amountAbs}"),
            field("Less Cash Back", ""),
            field("Cash back Accnt.", ""),
            field("Cash back Memo", ""),
        ],
        ExportType::QuickBooksChecks => vec![
            field("Bank Account", "{glNameMercuryChecking}"),
            field("Payee", "{txn.counterpartyName}"),
            field("Number", "{refNumber}"),
            field("Date", "{dateLocal}"),
            field("Total Amount", "{amountAbs}"),
            field("Memo", "{concat(txn.bankDescription, \" - \", txn.categoryData.name)}"),
            field("Expense Account", "{expenseAccount}"),
            field("Expense Amount", "{amountAbs}"),
            field("Expense Memo", "{txn.bankDescription}"),
            field("Expense Customer:Job", ""),
            field("Expense Billable", ""),
            field("Expense Class", ""),
            field("Item", ""),
            field("Item Description", ""),
            field("Item Qty.", ""),
            field("Item Cost", ""),
            field("Item Amount", ""),
            field("Item Customer:Job", ""),
            field("Item Billable", ""),
            field("Item Class", ""),
        ],
        ExportType::QuickBooksCreditCard => vec![
            field("Credit Card Account", "{glNameMercuryCreditCard}"),
            field("Purchased From", "{txn.counterpartyName}"),
            field("Ref Number", "{refNumber}"),
            field("Date", "{dateLocal}"),
            field("Expense Account", "{glCode}"),
            field("Expense Amount", "{amountAbs}"),
            field("Expense Customer:Job", "{txn.mercuryCategory}"),
            field("Expense Billable", ""),
            field("Expense Class", ""),
            field("Item", ""),
            field("Item Description", ""),
            field("Item Qty.", ""),
            field("Item Cost", ""),
            field("Item Amount", ""),
            field("Item Customer:Job", ""),
            field("Item Billable", ""),
            field("Item Class", ""),
        ],
    };

    ExportMapping {
        export_type,
        fields,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::CategoryData;

    fn txn() -> Transaction {
        Transaction {
            id: "txn_abcdef123456".to_string(),
            amount: 2867.7,
            created_at: "2024-12-25T09:30:00Z".to_string(),
            status: "sent".to_string(),
            bank_description: "Stripe transfer".to_string(),
            counterparty_name: Some("Stripe".to_string()),
            kind: "externalTransfer".to_string(),
            mercury_category: Some("Revenue".to_string()),
            general_ledger_code_name: Some("4000 Sales|4100 Services".to_string()),
            category_data: Some(CategoryData {
                id: "cat_9".to_string(),
                name: "Income".to_string(),
            }),
            details: None,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_deposit_classification() {
        assert!(is_deposit_transaction(&txn()));
        assert!(!is_withdrawal_transaction(&txn()));
        assert!(!is_credit_card_transaction(&txn()));
    }

    #[test]
    fn test_status_gate() {
        let mut cancelled = txn();
        cancelled.status = "cancelled".to_string();
        assert!(!is_deposit_transaction(&cancelled));
        assert!(!is_withdrawal_transaction(&cancelled));
        assert!(!is_credit_card_transaction(&cancelled));
    }

    #[test]
    fn test_outgoing_payment_is_withdrawal_regardless_of_sign() {
        let mut out = txn();
        out.kind = "outgoingPayment".to_string();
        assert!(is_withdrawal_transaction(&out));
        assert!(!is_deposit_transaction(&out));
    }

    #[test]
    fn test_io_autopay_credit_excluded_from_both() {
        let mut autopay = txn();
        autopay.kind = "other".to_string();
        autopay.bank_description = "IO AUTOPAY PAYMENT".to_string();
        autopay.amount = 938.16;
        assert!(!is_deposit_transaction(&autopay));
        assert!(!is_withdrawal_transaction(&autopay));
    }

    #[test]
    fn test_credit_card_classification() {
        let mut cc = txn();
        cc.kind = "creditCardTransaction".to_string();
        cc.amount = -3.74;
        assert!(is_credit_card_transaction(&cc));
        assert!(!is_withdrawal_transaction(&cc));
        assert!(!is_deposit_transaction(&cc));
    }

    #[test]
    fn test_normalize_gl_code() {
        assert_eq!(
            normalize_gl_code(Some("6000 Payroll|6100 Benefits")),
            "6000 Payroll,6100 Benefits"
        );
        assert_eq!(normalize_gl_code(Some("6000 Payroll")), "6000 Payroll");
        assert_eq!(normalize_gl_code(None), "");
    }

    #[test]
    fn test_format_export_date() {
        assert_eq!(format_export_date("2024-12-25T09:30:00Z"), "12/25/2024");
        assert_eq!(format_export_date("2024-03-05T00:00:00Z"), "3/5/2024");
        assert_eq!(format_export_date("not a date"), "");
    }

    #[test]
    fn test_format_abs_amount() {
        assert_eq!(format_abs_amount(-855.94), "855.94");
        assert_eq!(format_abs_amount(2000.0), "2000");
    }

    #[test]
    fn test_expense_account_io_autopay_override() {
        let mut autopay = txn();
        autopay.kind = "other".to_string();
        autopay.bank_description = "IO AUTOPAY PAYMENT".to_string();
        let vars = HashMap::from([(
            "glNameMercuryCreditCard".to_string(),
            "2100 Mercury CC".to_string(),
        )]);
        assert_eq!(expense_account(&autopay, &vars), "2100 Mercury CC");
        assert_eq!(
            expense_account(&txn(), &vars),
            "4000 Sales,4100 Services"
        );
    }

    #[test]
    fn test_default_deposit_row() {
        let mapping = default_mappings(ExportType::QuickBooksDeposits);
        let vars = HashMap::from([(
            "glNameMercuryChecking".to_string(),
            "1000 Mercury Checking".to_string(),
        )]);
        let row = mapping.render_row(&txn(), &vars, None).unwrap();

        assert_eq!(mapping.headers()[0], "Deposit To");
        assert_eq!(row[0], "1000 Mercury Checking");
        assert_eq!(row[1], "12/25/2024");
        assert_eq!(row[2], "Stripe transfer - Income");
        assert_eq!(row[3], "Stripe");
        assert_eq!(row[4], "4000 Sales,4100 Services");
        assert_eq!(row[6], ""); // Check No.
        assert_eq!(row[9], "2867.7"); // Amount, unsigned
    }

    #[test]
    fn test_default_credit_card_row_customer_job() {
        let mapping = default_mappings(ExportType::QuickBooksCreditCard);
        let mut cc = txn();
        cc.kind = "creditCardTransaction".to_string();
        let vars = HashMap::from([(
            "glNameMercuryCreditCard".to_string(),
            "2100 Mercury CC".to_string(),
        )]);
        let row = mapping.render_row(&cc, &vars, None).unwrap();
        assert_eq!(row[0], "2100 Mercury CC");
        assert_eq!(row[2], "txn_abcd"); // truncated reference id
        assert_eq!(row[6], "Revenue");
    }

    #[test]
    fn test_export_type_codes_round_trip() {
        for export_type in [
            ExportType::MercuryTransactions,
            ExportType::QuickBooksDeposits,
            ExportType::QuickBooksChecks,
            ExportType::QuickBooksCreditCard,
        ] {
            assert_eq!(ExportType::from_code(export_type.code()), Some(export_type));
        }
    }
}
