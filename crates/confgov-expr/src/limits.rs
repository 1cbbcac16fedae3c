//! Structural limits checked before an expression reaches the CEL parser.
//!
//! Parsing, evaluating and dropping an expression tree all recurse once per
//! level, so the depth of a caller-supplied expression has to be bounded up
//! front. Every operator can add a level (`!!!x`, `a.b.c`, `1 + 1 + 1`), so
//! both bracket nesting and the total operator count are capped. String
//! literals are skipped and do not count.

use crate::error::{ExprError, ExprResult};

/// Deepest bracket nesting accepted.
pub const MAX_NESTING: usize = 32;

/// Most operators, selectors and calls accepted in one expression.
pub const MAX_OPERATORS: usize = 256;

/// Reject `source` if it nests or chains beyond the limits.
///
/// # Errors
///
/// Returns [`ExprError::TooDeep`] when either limit is exceeded.
pub fn check_depth(source: &str) -> ExprResult<()> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut operators = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote, false);
                continue;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                operators += 1;
                if depth > MAX_NESTING {
                    return Err(ExprError::TooDeep);
                }
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'!' | b'-' | b'+' | b'*' | b'/' | b'%' | b'.' | b'<' | b'>' | b'=' | b'&' | b'|'
            | b'?' => operators += 1,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &source[start..i];
                if word == "in" {
                    operators += 1;
                } else if is_string_prefix(word)
                    && let Some(&quote) = bytes.get(i)
                    && (quote == b'"' || quote == b'\'')
                {
                    let raw = word.bytes().any(|b| b.eq_ignore_ascii_case(&b'r'));
                    i = skip_string(bytes, i, quote, raw);
                }
                if operators > MAX_OPERATORS {
                    return Err(ExprError::TooDeep);
                }
                continue;
            }
            _ => {}
        }

        if operators > MAX_OPERATORS {
            return Err(ExprError::TooDeep);
        }
        i += 1;
    }

    Ok(())
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "b" | "rb" | "br"
    )
}

/// Returns the index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize, quote: u8, raw: bool) -> usize {
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && !raw {
            i += 2;
            continue;
        }
        if b == quote {
            if !triple {
                return i + 1;
            }
            if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                return i + 3;
            }
        }
        i += 1;
    }

    bytes.len()
}
