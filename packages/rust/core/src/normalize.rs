//! Response normalization: reduce any generation output to plain text.

use serde_json::Value;

use crate::generation::RawGenerationOutput;

/// Extract the text of a generation output. Never fails.
///
/// A structured value with a text attribute yields that attribute, a plain
/// string is returned as-is, and anything else falls back to its JSON
/// representation.
pub fn response_text(output: RawGenerationOutput) -> String {
    match output {
        RawGenerationOutput::Text(text) => text,
        RawGenerationOutput::Completion(completion) => completion.content,
        RawGenerationOutput::Json(value) => value_text(value),
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Object(mut map) => {
            for key in ["content", "text"] {
                if let Some(attr) = map.remove(key) {
                    if let Some(text) = attribute_text(&attr) {
                        return text;
                    }
                    map.insert(key.to_string(), attr);
                }
            }
            Value::Object(map).to_string()
        }
        other => other.to_string(),
    }
}

/// A text attribute is either a string or a list of content parts
/// (`[{"type": "text", "text": "..."}]`), which are concatenated.
fn attribute_text(attr: &Value) -> Option<String> {
    match attr {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.as_str().or_else(|| p.get("text").and_then(Value::as_str)))
                .collect();
            (!texts.is_empty()).then(|| texts.concat())
        }
        _ => None,
    }
}
