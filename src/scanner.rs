//! Quote- and escape-aware lexical scanning over raw SQL text.
//!
//! This is deliberately not a SQL parser. The two operations here only need
//! to answer "is there an unquoted statement separator?" and "what does the
//! text look like with literal contents removed?", and both must err on the
//! conservative side for malformed input.

/// Returns true if the text contains a semicolon outside of single- or
/// double-quoted regions, i.e. the input smuggles more than one statement.
///
/// A backslash escapes exactly the following character. An unterminated
/// quote suppresses detection for the rest of the text: a dangling opening
/// quote means we stay "inside a string" until end of input.
pub fn contains_multiple_statements(sql: &str) -> bool {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escaped = false;

    for ch in sql.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => return true,
            _ => {}
        }
    }

    false
}

/// Replaces the contents of single-quoted, double-quoted, and
/// backtick-quoted runs with nothing, keeping the delimiter pair, so that
/// keyword search never matches words that only appear inside literals.
///
/// Backslash escapes inside a quoted run are honored: `'don\'t'` is one
/// literal, not two. An unterminated run swallows the rest of the input.
pub fn strip_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                out.push(ch);
                let delimiter = ch;
                let mut escaped = false;
                for inner in chars.by_ref() {
                    if escaped {
                        escaped = false;
                        continue;
                    }
                    if inner == '\\' {
                        escaped = true;
                        continue;
                    }
                    if inner == delimiter {
                        out.push(delimiter);
                        break;
                    }
                }
            }
            _ => out.push(ch),
        }
    }

    out
}
