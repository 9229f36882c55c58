//! Strict parsing of structured model output
//!
//! Models are prompted to answer with a JSON document. The only leniency is
//! stripping a surrounding Markdown code fence; anything else that is not
//! valid JSON for the target type is an error.

use serde::de::DeserializeOwned;

use crate::errors::{LlmError, Result};

/// Parse model output into `T`, rejecting anything that is not strict JSON
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str(body).map_err(|e| LlmError::structured_output(e.to_string(), raw))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
