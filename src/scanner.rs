// 🔍 Template Scanner - balanced call spans and quote-aware splitting
// Locates {name(...)} occurrences and splits argument lists without a
// full grammar; the driver layers these passes in a fixed order.

// ============================================================================
// CALL SCANNING
// ============================================================================

/// Find every non-overlapping `{name(...)}` substring with balanced
/// parentheses, left to right. A `{name(` with no balanced close before the
/// end of the string is not reported.
///
/// Depth tracking counts only `(` / `)` — quotes are NOT special here, so a
/// quoted literal containing an unbalanced parenthesis (e.g. `"A(B"`)
/// desynchronizes the scan and the call goes unreported. Known limitation,
/// kept deliberately; callers rely on the unsubstituted-call fallback.
pub fn find_function_calls(template: &str, function_name: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let pattern = format!("{{{function_name}(");
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < template.len() {
        let Some(offset) = template[i..].find(&pattern) else {
            break;
        };
        let start = i + offset;

        // Walk from the opening '(' until depth returns to zero
        let mut depth: i32 = 0;
        let mut j = start + pattern.len() - 1;
        let mut advanced = false;
        while j < template.len() {
            match bytes[j] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        if j + 1 < template.len() && bytes[j + 1] == b'}' {
                            matches.push(template[start..j + 2].to_string());
                            i = j + 2;
                        } else {
                            // Balanced call not wrapped by '}': skip it
                            i = start + 1;
                        }
                        advanced = true;
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }

        if !advanced {
            // Ran off the end without closing: resume past this occurrence
            i = start + 1;
        }
    }

    matches
}

/// A located call span. `text` is the exact substring to replace (including
/// the surrounding braces when present); `arg` is the interior string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpan {
    pub text: String,
    pub arg: String,
}

/// Find `name(...)` call spans wherever they appear, braced or not.
///
/// The `ledgerPresetKey` pass uses this so the nested composition
/// `ledgerLookup(ledgerPresetKey(lookup:X))` gets its key substituted as a
/// literal before the outer lookup runs. A word-boundary check skips
/// longer identifiers that merely end with the name. Depth tracking is
/// quote-blind, matching [`find_function_calls`].
pub fn find_call_spans(template: &str, function_name: &str) -> Vec<CallSpan> {
    let mut spans = Vec::new();
    let pattern = format!("{function_name}(");
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < template.len() {
        let Some(offset) = template[i..].find(&pattern) else {
            break;
        };
        let start = i + offset;

        if start > 0 {
            let prev = bytes[start - 1];
            if prev.is_ascii_alphanumeric() || prev == b'_' {
                i = start + pattern.len();
                continue;
            }
        }

        let mut depth: i32 = 0;
        let mut j = start + pattern.len() - 1;
        let mut close = None;
        while j < template.len() {
            match bytes[j] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(j);
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }

        let Some(close) = close else {
            i = start + 1;
            continue;
        };

        let braced = start > 0
            && bytes[start - 1] == b'{'
            && close + 1 < template.len()
            && bytes[close + 1] == b'}';
        let (span_start, span_end) = if braced {
            (start - 1, close + 2)
        } else {
            (start, close + 1)
        };

        spans.push(CallSpan {
            text: template[span_start..span_end].to_string(),
            arg: template[start + pattern.len()..close].to_string(),
        });
        i = span_end;
    }

    spans
}

// ============================================================================
// ARGUMENT SPLITTING
// ============================================================================

/// Split a function's argument list on top-level commas.
///
/// Commas nested in parentheses or inside an active single/double-quoted
/// span are not split points. A `\` immediately before a quote character
/// suppresses the quote toggle. Whitespace around arguments is preserved;
/// callers trim.
pub fn split_args(input: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    let mut quote_char = ' ';
    let mut prev: Option<char> = None;

    for ch in input.chars() {
        let escaped = prev == Some('\\');
        if (ch == '"' || ch == '\'') && !escaped {
            if !in_quotes {
                in_quotes = true;
                quote_char = ch;
            } else if ch == quote_char {
                in_quotes = false;
            }
            current.push(ch);
        } else if ch == '(' && !in_quotes {
            depth += 1;
            current.push(ch);
        } else if ch == ')' && !in_quotes {
            depth -= 1;
            current.push(ch);
        } else if ch == ',' && depth == 0 && !in_quotes {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
        prev = Some(ch);
    }

    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// Split a comparison string on every top-level occurrence of `operator`,
/// respecting quoted spans (an operator inside quotes is literal text).
/// `'txn.name=="Test, Inc"'` splits into `['txn.name', '"Test, Inc"']`.
pub fn split_comparison(input: &str, operator: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = ' ';
    let mut prev: Option<char> = None;
    let mut iter = input.char_indices();

    while let Some((i, ch)) = iter.next() {
        let escaped = prev == Some('\\');
        if (ch == '"' || ch == '\'') && !escaped {
            if !in_quotes {
                in_quotes = true;
                quote_char = ch;
            } else if ch == quote_char {
                in_quotes = false;
            }
            current.push(ch);
            prev = Some(ch);
        } else if !in_quotes && input[i..].starts_with(operator) {
            parts.push(std::mem::take(&mut current));
            let mut consumed = ch.len_utf8();
            while consumed < operator.len() {
                match iter.next() {
                    Some((_, skipped)) => consumed += skipped.len_utf8(),
                    None => break,
                }
            }
            prev = operator.chars().last();
        } else {
            current.push(ch);
            prev = Some(ch);
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

// ============================================================================
// TESTS
// ============================================================================
