//! Prompt rendering: bind runtime values into a task template.
//!
//! Templates use `{name}` placeholders. `{{` and `}}` are literal braces, so a
//! JSON example can be embedded in a template. Substituted values are inserted
//! verbatim and never re-scanned.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use rfpscope_shared::AnalysisError;

use crate::task::{PromptTemplate, TaskSpec};

/// Variable name → value mapping passed to the renderer.
pub type Variables = HashMap<String, String>;

/// A fully substituted prompt, ready for the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedPrompt {
    Text(String),
    Chat { system: String, user: String },
}

impl RenderedPrompt {
    /// All prompt text joined with blank lines, for logging and matching.
    pub fn full_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Chat { system, user } => format!("{system}\n\n{user}"),
        }
    }

    /// Total prompt length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Chat { system, user } => system.len() + user.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 of the prompt, used to correlate log lines across runs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            Self::Text(text) => hasher.update(text.as_bytes()),
            Self::Chat { system, user } => {
                hasher.update(system.as_bytes());
                hasher.update([0u8]);
                hasher.update(user.as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Render a task's template against `variables`.
///
/// Every declared variable must be present; an empty value is fine.
pub fn render(spec: &TaskSpec, variables: &Variables) -> Result<RenderedPrompt, AnalysisError> {
    for name in &spec.required_variables {
        if !variables.contains_key(name) {
            return Err(AnalysisError::MissingVariable { name: name.clone() });
        }
    }

    match &spec.template {
        PromptTemplate::Single(template) => Ok(RenderedPrompt::Text(substitute(template, variables)?)),
        PromptTemplate::Chat { system, user } => Ok(RenderedPrompt::Chat {
            system: substitute(system, variables)?,
            user: substitute(user, variables)?,
        }),
    }
}

/// Replace every placeholder in `template` with its value.
pub fn substitute(template: &str, variables: &Variables) -> Result<String, AnalysisError> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Brace(c) => out.push(c),
            Segment::Placeholder(name) => {
                let value = variables
                    .get(name)
                    .ok_or_else(|| AnalysisError::MissingVariable { name: name.into() })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

/// Placeholder names in `template`, in order of appearance (may repeat).
pub fn placeholders(template: &str) -> Vec<&str> {
    segments(template)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Double every brace so `text` survives substitution unchanged.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

// ---------------------------------------------------------------------------
// Template scanning
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    /// An escaped `{{` or `}}`.
    Brace(char),
    Placeholder(&'a str),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'{' || b == b'}') && bytes.get(i + 1) == Some(&b) {
            push_literal(&mut out, &template[start..i]);
            out.push(Segment::Brace(b as char));
            i += 2;
            start = i;
            continue;
        }

        if b == b'{' {
            if let Some(len) = template[i + 1..].find('}') {
                let name = &template[i + 1..i + 1 + len];
                if is_identifier(name) {
                    push_literal(&mut out, &template[start..i]);
                    out.push(Segment::Placeholder(name));
                    i += len + 2;
                    start = i;
                    continue;
                }
            }
        }

        // Lone braces and anything else stay literal.
        i += 1;
    }

    push_literal(&mut out, &template[start..]);
    out
}

fn push_literal<'a>(out: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        out.push(Segment::Literal(text));
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
