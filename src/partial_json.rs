//! Best-effort repair of a truncated JSON document.
//!
//! Structured-object parts stream in as a growing text buffer that is valid
//! JSON only once the server finishes emitting it. `repair_partial_json`
//! lets the reducer render a usable value from each intermediate snapshot
//! instead of waiting for the final delta.

use serde_json::Value;

/// Attempt to parse `text` as JSON; if it doesn't parse as-is, scan it for
/// unterminated strings and unmatched brackets/braces, close them in the
/// right order, and retry.
///
/// Returns `None` if the buffer still doesn't parse after repair (e.g. it's
/// not JSON at all, or the truncation happened mid-token in a way that
/// can't be closed mechanically).
pub fn repair_partial_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut in_string = false;
    let mut escaped = false;
    let mut brace_depth: i32 = 0;
    let mut bracket_depth: i32 = 0;

    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => brace_depth += 1,
            '}' if !in_string => brace_depth -= 1,
            '[' if !in_string => bracket_depth += 1,
            ']' if !in_string => bracket_depth -= 1,
            _ => {}
        }
    }

    let mut repaired = text.to_string();

    if in_string {
        repaired.push('"');
    }
    for _ in 0..bracket_depth.max(0) {
        repaired.push(']');
    }
    for _ in 0..brace_depth.max(0) {
        repaired.push('}');
    }

    serde_json::from_str(&repaired).ok()
}
