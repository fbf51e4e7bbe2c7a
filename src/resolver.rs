// 🧮 Value Resolver - single-token resolution and condition evaluation
// Resolves one trimmed argument token to a display string. All "not found"
// conditions are None; the driver collapses None to "" only when splicing
// into the output.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::TemplateError;
use crate::scanner::split_comparison;
use crate::template::{process_nested, EvalContext};
use crate::transaction::{display_value, path_value};

/// Tokens that are themselves function expressions get re-wrapped in braces
/// and run back through the full pipeline.
static NESTED_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(if|or|concat|ledgerLookup|ledgerPresetKey)\(")
        .expect("nested function pattern")
});

// ============================================================================
// VALUE RESOLUTION
// ============================================================================

/// Resolve one trimmed argument token, in precedence order: quoted literal,
/// nested function expression, `ledgerLookup(key)` shorthand,
/// `lookup:<path>`, `txn.<path>`, plain additional variable.
///
/// No path here errors for a well-formed token; the only `Err` is the
/// nesting ceiling bubbling up from a recursive evaluation.
pub(crate) fn resolve_value(
    arg: &str,
    ctx: &EvalContext<'_>,
    depth: usize,
) -> Result<Option<String>, TemplateError> {
    // Quoted string literal (single or double quotes): interior verbatim
    if let Some(inner) = strip_quotes(arg) {
        return Ok(Some(inner.to_string()));
    }

    // Nested function call: full round-trip through the driver
    if NESTED_FN.is_match(arg) {
        let wrapped = format!("{{{arg}}}");
        return process_nested(&wrapped, ctx, depth + 1).map(Some);
    }

    // ledgerLookup(key) literal shorthand - redundant with the nested
    // branch above, kept for clarity
    if let Some(rest) = arg.strip_prefix("ledgerLookup(") {
        if let Some(key) = rest.strip_suffix(')') {
            return Ok(ctx
                .ledger
                .and_then(|ledger| ledger.record(key))
                .map(str::to_string));
        }
    }

    // lookup:property → three-hop ledger chain
    if let Some(path) = arg.strip_prefix("lookup:") {
        return Ok(ctx.ledger.and_then(|ledger| ledger.lookup_value(ctx.txn, path)));
    }

    // txn.property → dotted-path field access
    if let Some(path) = arg.strip_prefix("txn.") {
        return Ok(path_value(ctx.txn, path).and_then(display_value));
    }

    // Plain variable from the per-export additional vars
    Ok(ctx.vars.get(arg).cloned())
}

fn strip_quotes(arg: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if arg.len() >= 2 && arg.starts_with(quote) && arg.ends_with(quote) {
            return Some(&arg[1..arg.len() - 1]);
        }
    }
    None
}

// ============================================================================
// CONDITION EVALUATION
// ============================================================================

/// Evaluate an `if` condition.
///
/// `!=` is checked before `==` so it wins when both substrings could match.
/// Each operator only applies when the quote-aware split yields exactly two
/// sides; otherwise the cascade falls through, ending at truthiness of the
/// whole condition as a single token (non-empty = true).
pub(crate) fn evaluate_condition(
    condition: &str,
    ctx: &EvalContext<'_>,
    depth: usize,
) -> Result<bool, TemplateError> {
    if condition.contains("!=") {
        let parts = split_comparison(condition, "!=");
        if parts.len() == 2 {
            let left = resolve_side(parts[0].trim(), ctx, depth)?;
            let right = resolve_side(parts[1].trim(), ctx, depth)?;
            return Ok(left != right);
        }
    }

    if condition.contains("==") {
        let parts = split_comparison(condition, "==");
        if parts.len() == 2 {
            let left = resolve_side(parts[0].trim(), ctx, depth)?;
            let right = resolve_side(parts[1].trim(), ctx, depth)?;
            return Ok(left == right);
        }
    }

    Ok(resolve_value(condition, ctx, depth)?.is_some_and(|value| !value.is_empty()))
}

/// Comparison sides resolve like any other token; a missing value compares
/// as the empty string.
fn resolve_side(
    side: &str,
    ctx: &EvalContext<'_>,
    depth: usize,
) -> Result<String, TemplateError> {
    Ok(resolve_value(side, ctx, depth)?.unwrap_or_default())
}

// ============================================================================
// TESTS
// ============================================================================
