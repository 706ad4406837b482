//! Fence-tolerant structured-output decoding.
//!
//! Providers asked for JSON still sometimes wrap the payload in a fenced
//! code block, with or without a language tag. Decoding strips any fence
//! before handing the payload to serde.

use crate::error::ParseError;
use serde::de::DeserializeOwned;

/// Strip a surrounding markdown code fence, if present.
///
/// Handles ```json-tagged fences, plain ``` fences, and bare payloads.
/// Fenced and bare forms of the same JSON decode identically.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = extract_fenced(trimmed, "```json") {
        return inner;
    }
    if let Some(inner) = extract_fenced(trimmed, "```") {
        return inner;
    }

    trimmed
}

fn extract_fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let (_, after_open) = text.split_once(opener)?;
    let (inner, _) = after_open.split_once("```")?;
    Some(inner.trim())
}

/// Decode a provider's structured response into `T`.
pub fn decode_structured<T: DeserializeOwned>(response: &str) -> Result<T, ParseError> {
    let payload = strip_code_fence(response);
    serde_json::from_str(payload).map_err(|e| ParseError {
        reason: e.to_string(),
        raw: response.to_string(),
    })
}
