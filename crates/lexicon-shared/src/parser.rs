//! Response parser: raw generator text to a validated candidate.
//!
//! Generators often wrap JSON in markdown fences or add a sentence of
//! chatter around it. Both are stripped before decoding.

use crate::entry::GenerationCandidate;
use crate::error::ParseError;
use serde::Deserialize;

/// Wire shape of a candidate. The aliases are the field names used by
/// earlier prompt versions.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default, alias = "word")]
    term: Option<String>,
    #[serde(default, alias = "meaning")]
    definition: Option<String>,
    #[serde(default, alias = "examples")]
    usages: Option<Vec<String>>,
}

/// Parse one raw generator payload into a candidate.
pub fn parse(raw_text: &str) -> Result<GenerationCandidate, ParseError> {
    let body = extract_object(strip_fences(raw_text));
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let raw: RawCandidate =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let term = non_empty(raw.term).ok_or(ParseError::MissingField("term"))?;
    let definition = non_empty(raw.definition).ok_or(ParseError::MissingField("definition"))?;

    let usages: Vec<String> = raw
        .usages
        .unwrap_or_default()
        .into_iter()
        .map(|u| u.trim().to_string())
        .collect();
    if usages.is_empty() || usages.iter().any(|u| u.is_empty()) {
        return Err(ParseError::MissingField("usages"));
    }

    Ok(GenerationCandidate {
        term,
        definition,
        usages,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Remove a surrounding ```lang ... ``` fence, if present.
fn strip_fences(raw: &str) -> &str {
    let mut t = raw.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            // Single-line fence: ```json{...}```
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = t.trim_end().strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Narrow the text to its outermost `{...}` span when there is chatter
/// around the object.
fn extract_object(text: &str) -> &str {
    if text.starts_with('{') && text.ends_with('}') {
        return text;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => text,
    }
}
