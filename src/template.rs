// 🧩 Template Driver - fixed-order substitution pipeline
// Each stage scans the result of the previous one:
// if → or → concat → ledgerPresetKey → ledgerLookup → lookup: → txn. → vars
// The order is part of the contract: function arguments resolve their own
// txn./lookup: tokens recursively, because by the time the token stages run
// the outer call has already been replaced.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::TemplateError;
use crate::ledger::LedgerContext;
use crate::resolver::{evaluate_condition, resolve_value};
use crate::scanner::{find_call_spans, find_function_calls, split_args};
use crate::transaction::{display_value, path_value, Transaction};

/// Ceiling on nested function recursion. Deeper templates are rejected
/// instead of risking unbounded work on hostile input.
pub const MAX_NESTING_DEPTH: usize = 16;

/// Ceiling on template length in bytes.
pub const MAX_TEMPLATE_LEN: usize = 64 * 1024;

static LOOKUP_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{lookup:[^}]+\}").expect("lookup token pattern"));
static TXN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{txn\.[^}]+\}").expect("txn token pattern"));

/// Read-only snapshot of the inputs for one `process_template` call.
/// Nothing here is mutated; recursive evaluations share the same snapshot.
pub(crate) struct EvalContext<'a> {
    pub txn: &'a Value,
    pub vars: &'a HashMap<String, String>,
    pub ledger: Option<&'a LedgerContext>,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Substitute every template token against a transaction record, a map of
/// additional variables, and an optional ledger lookup context, producing
/// one CSV cell value.
///
/// Missing data of any kind degrades to an empty substitution; the `Err`
/// arm fires only for templates that exceed the nesting or length ceilings.
pub fn process_template(
    template: &str,
    txn: &Transaction,
    additional_vars: &HashMap<String, String>,
    ledger: Option<&LedgerContext>,
) -> Result<String, TemplateError> {
    let snapshot = txn.to_snapshot();
    let ctx = EvalContext {
        txn: &snapshot,
        vars: additional_vars,
        ledger,
    };
    process_nested(template, &ctx, 0)
}

// ============================================================================
// STAGED PIPELINE
// ============================================================================

pub(crate) fn process_nested(
    template: &str,
    ctx: &EvalContext<'_>,
    depth: usize,
) -> Result<String, TemplateError> {
    if template.len() > MAX_TEMPLATE_LEN {
        return Err(TemplateError::TooLarge(template.len()));
    }
    if depth > MAX_NESTING_DEPTH {
        return Err(TemplateError::TooComplex);
    }

    let mut result = template.to_string();

    // {if(condition, trueValue, falseValue)}
    for call in find_function_calls(template, "if") {
        let args = split_args(&call[4..call.len() - 2]);
        if args.len() == 3 {
            let chosen = if evaluate_condition(args[0].trim(), ctx, depth)? {
                args[1].trim()
            } else {
                args[2].trim()
            };
            let resolved = resolve_value(chosen, ctx, depth)?.unwrap_or_default();
            result = result.replacen(&call, &resolved, 1);
        }
    }

    // {or(a, b, ...)} → first non-empty resolution
    for call in find_function_calls(&result, "or") {
        let args = split_args(&call[4..call.len() - 2]);
        let mut or_value = String::new();
        for arg in &args {
            if let Some(value) = resolve_value(arg.trim(), ctx, depth)? {
                if !value.is_empty() {
                    or_value = value;
                    break;
                }
            }
        }
        result = result.replacen(&call, &or_value, 1);
    }

    // {concat(a, b, ...)} → every resolution joined with no separator
    for call in find_function_calls(&result, "concat") {
        let args = split_args(&call[8..call.len() - 2]);
        let mut joined = String::new();
        for arg in &args {
            joined.push_str(&resolve_value(arg.trim(), ctx, depth)?.unwrap_or_default());
        }
        result = result.replacen(&call, &joined, 1);
    }

    if let Some(ledger) = ctx.ledger {
        // ledgerPresetKey(...) — before ledgerLookup, so a nested
        // ledgerLookup(ledgerPresetKey(...)) sees the key already
        // substituted as a literal
        for span in find_call_spans(&result, "ledgerPresetKey") {
            let key = ledger
                .preset_key(span.arg.trim(), ctx.txn, ctx.vars)
                .unwrap_or_default();
            result = result.replacen(&span.text, &key, 1);
        }

        // {ledgerLookup(key)} — the raw interior is the record key, no
        // trimming and no nested resolution
        for call in find_function_calls(&result, "ledgerLookup") {
            let value = ledger.record(&call[14..call.len() - 2]).unwrap_or_default();
            result = result.replacen(&call, value, 1);
        }

        // {lookup:property} tokens
        let tokens: Vec<String> = LOOKUP_TOKEN
            .find_iter(&result)
            .map(|m| m.as_str().to_string())
            .collect();
        for token in tokens {
            let value = ledger
                .lookup_value(ctx.txn, &token[8..token.len() - 1])
                .unwrap_or_default();
            result = result.replacen(&token, &value, 1);
        }
    }

    // {txn.path} tokens
    let tokens: Vec<String> = TXN_TOKEN
        .find_iter(&result)
        .map(|m| m.as_str().to_string())
        .collect();
    for token in tokens {
        let value = path_value(ctx.txn, &token[5..token.len() - 1])
            .and_then(display_value)
            .unwrap_or_default();
        result = result.replacen(&token, &value, 1);
    }

    // {var} tokens from the additional vars
    for (key, value) in ctx.vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }

    Ok(result)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerPreset, MercuryAccount};
    use crate::transaction::CategoryData;

    fn txn() -> Transaction {
        Transaction {
            id: "txn_abc12345".to_string(),
            amount: -42.5,
            created_at: "2024-12-31T12:00:00Z".to_string(),
            status: "sent".to_string(),
            bank_description: "ACME PAYROLL".to_string(),
            counterparty_name: Some("Acme".to_string()),
            kind: "outgoingPayment".to_string(),
            mercury_category: None,
            general_ledger_code_name: Some("6000 Payroll".to_string()),
            category_data: Some(CategoryData {
                id: "cat_1".to_string(),
                name: "Payroll".to_string(),
            }),
            details: None,
            attachments: Vec::new(),
        }
    }

    fn ledger() -> LedgerContext {
        LedgerContext {
            ledger_records: HashMap::from([
                ("gl_checking".to_string(), "Checking-1000".to_string()),
                (
                    "gl_name_mercury_checking".to_string(),
                    "Mercury Checking".to_string(),
                ),
            ]),
            mercury_accounts: Some(vec![MercuryAccount {
                id: 1,
                external_id: "ext_1".to_string(),
                name: "Acme".to_string(),
                nickname: None,
            }]),
            ledger_presets: Some(vec![LedgerPreset {
                id: 3,
                key: "gl_checking".to_string(),
                label: "Checking".to_string(),
            }]),
            account_mappings: Some(HashMap::from([(1, 3)])),
        }
    }

    fn run(template: &str) -> String {
        process_template(template, &txn(), &HashMap::new(), None).unwrap()
    }

    fn run_with_ledger(template: &str) -> String {
        process_template(template, &txn(), &HashMap::new(), Some(&ledger())).unwrap()
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(run("Deposit memo"), "Deposit memo");
    }

    #[test]
    fn test_txn_substitution() {
        assert_eq!(run("{txn.amount}"), "-42.5");
        assert_eq!(run("{txn.counterpartyName} paid"), "Acme paid");
    }

    #[test]
    fn test_missing_nested_field_is_empty() {
        let mut bare = txn();
        bare.category_data = None;
        let out = process_template("{txn.categoryData.name}", &bare, &HashMap::new(), None).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_substitution_is_idempotent_without_tokens() {
        let once = run("{txn.status} done");
        let twice = process_template(&once, &txn(), &HashMap::new(), None).unwrap();
        assert_eq!(once, "sent done");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_if_true_and_false_branches() {
        assert_eq!(run("{if(txn.status==\"sent\", \"A\", \"B\")}"), "A");
        let mut pending = txn();
        pending.status = "pending".to_string();
        let out = process_template(
            "{if(txn.status==\"sent\", \"A\", \"B\")}",
            &pending,
            &HashMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(out, "B");
    }

    #[test]
    fn test_if_wrong_arity_left_in_place() {
        assert_eq!(run("{if(txn.status, \"A\")}"), "{if(txn.status, \"A\")}");
    }

    #[test]
    fn test_or_picks_first_non_empty() {
        // lookup: fails (no context), ledgerLookup succeeds
        let out = run_with_ledger(
            "{or(lookup:bankDescription, ledgerLookup(gl_name_mercury_checking), txn.generalLedgerCodeName)}",
        );
        assert_eq!(out, "Mercury Checking");
    }

    #[test]
    fn test_or_all_empty_yields_empty() {
        assert_eq!(run("{or(txn.absent, unknownVar)}"), "");
    }

    #[test]
    fn test_concat() {
        let out = run("{concat(txn.counterpartyName, \" - \", txn.categoryData.name)}");
        assert_eq!(out, "Acme - Payroll");
    }

    #[test]
    fn test_ledger_lookup_literal_key() {
        assert_eq!(
            run_with_ledger("{ledgerLookup(gl_name_mercury_checking)}"),
            "Mercury Checking"
        );
        assert_eq!(run_with_ledger("{ledgerLookup(gl_unknown)}"), "");
    }

    #[test]
    fn test_ledger_stages_skipped_without_context() {
        assert_eq!(
            run("{ledgerLookup(gl_name_mercury_checking)}"),
            "{ledgerLookup(gl_name_mercury_checking)}"
        );
    }

    #[test]
    fn test_lookup_token() {
        assert_eq!(run_with_ledger("{lookup:counterpartyName}"), "Checking-1000");
        assert_eq!(run_with_ledger("{lookup:bankDescription}"), "");
    }

    #[test]
    fn test_preset_key_token() {
        assert_eq!(
            run_with_ledger("{ledgerPresetKey(lookup:counterpartyName)}"),
            "gl_checking"
        );
    }

    #[test]
    fn test_preset_key_composes_with_ledger_lookup() {
        let out = run_with_ledger("{ledgerLookup(ledgerPresetKey(lookup:counterpartyName))}");
        assert_eq!(out, "Checking-1000");
    }

    #[test]
    fn test_additional_var_substitution() {
        let vars = HashMap::from([(
            "glNameMercuryChecking".to_string(),
            "1000 Mercury Checking".to_string(),
        )]);
        let out = process_template("{glNameMercuryChecking}", &txn(), &vars, None).unwrap();
        assert_eq!(out, "1000 Mercury Checking");
    }

    #[test]
    fn test_additional_var_replaces_every_occurrence() {
        let vars = HashMap::from([("x".to_string(), "v".to_string())]);
        let out = process_template("{x}/{x}", &txn(), &vars, None).unwrap();
        assert_eq!(out, "v/v");
    }

    #[test]
    fn test_nested_if_inside_or() {
        let out = run("{or(txn.absent, if(txn.status==\"sent\", \"S\", \"P\"))}");
        assert_eq!(out, "S");
    }

    #[test]
    fn test_quote_blind_scanner_leaves_call_unsubstituted() {
        // Unbalanced '(' inside a quoted literal desynchronizes the scan;
        // the call is left in place rather than erroring.
        let template = "{concat(\"A(B\", txn.status)}";
        assert_eq!(run(template), template);
    }

    #[test]
    fn test_nesting_ceiling() {
        let depth = MAX_NESTING_DEPTH + 4;
        let template = format!("{{{}'x'{}}}", "or(".repeat(depth), ")".repeat(depth));
        let err = process_template(&template, &txn(), &HashMap::new(), None).unwrap_err();
        assert_eq!(err, TemplateError::TooComplex);
    }

    #[test]
    fn test_length_ceiling() {
        let template = "x".repeat(MAX_TEMPLATE_LEN + 1);
        let err = process_template(&template, &txn(), &HashMap::new(), None).unwrap_err();
        assert_eq!(err, TemplateError::TooLarge(MAX_TEMPLATE_LEN + 1));
    }

    #[test]
    fn test_two_calls_same_stage() {
        let out = run("{concat(\"a\")}-{concat(\"b\")}");
        assert_eq!(out, "a-b");
    }
}
