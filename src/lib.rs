// Mercury Export - Core Library
// Template-driven CSV exports for Mercury bank transactions

pub mod error;
pub mod exports;
pub mod ledger;
pub mod scanner;
pub mod template;
pub mod transaction;

mod resolver;

// Re-export commonly used types
pub use error::TemplateError;
pub use exports::{
    default_mappings, export_vars, format_abs_amount, format_export_date,
    is_credit_card_transaction, is_deposit_transaction, is_withdrawal_transaction,
    matches_export, normalize_gl_code, ExportMapping, ExportType, FieldMapping,
    QUICKBOOKS_EXPORTABLE_STATUSES,
};
pub use ledger::{LedgerContext, LedgerPreset, MercuryAccount};
pub use scanner::{find_call_spans, find_function_calls, split_args, split_comparison, CallSpan};
pub use template::{process_template, MAX_NESTING_DEPTH, MAX_TEMPLATE_LEN};
pub use transaction::{
    Attachment, CategoryData, CreditCardInfo, Details, Transaction,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
