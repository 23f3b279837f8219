//! Locate and parse the JSON object inside a model response.
//!
//! Models routinely wrap their answer in prose or Markdown fences. The
//! extractor finds the `{ ... }` region and parses it; it does not check the
//! parsed value against any schema.

use serde_json::Value;
use tracing::debug;

use rfpscope_shared::{AnalysisError, ExtractStrategy};

/// Parse the JSON region of `text` using `strategy`.
pub fn extract_json(text: &str, strategy: ExtractStrategy) -> Result<Value, AnalysisError> {
    let span = match strategy {
        ExtractStrategy::Greedy => greedy_span(text),
        ExtractStrategy::Balanced => balanced_span(text).or_else(|| greedy_span(text)),
    }
    .ok_or(AnalysisError::NoJsonFound)?;

    debug!(span_len = span.len(), text_len = text.len(), ?strategy, "located JSON region");

    serde_json::from_str(span).map_err(|e| AnalysisError::MalformedJson {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// Leftmost `{` through rightmost `}`, inclusive.
fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Leftmost `{` through the `}` that brings nesting depth back to zero.
/// Braces inside JSON string literals are ignored. `None` if unbalanced.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, b) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}
