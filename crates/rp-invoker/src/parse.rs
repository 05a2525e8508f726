//! Best-effort JSON extraction from a raw model reply.

use serde_json::Value;

/// Strip a leading/trailing Markdown code fence (```` ```json ... ``` ````
/// or plain ```` ``` ... ``` ````) if present.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    let body = body.trim_start_matches(['\n', '\r']);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Slice the outermost `{...}` or `[...]` span out of a string that may
/// have leading/trailing prose around the JSON payload.
pub fn slice_outermost_braces(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let open_candidates = ['{', '['];
    let start = bytes
        .iter()
        .position(|b| open_candidates.contains(&(*b as char)))?;
    let opening = bytes[start] as char;
    let closing = if opening == '{' { '}' } else { ']' };
    let end = raw.rfind(closing)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse best-effort: try the raw string first, then fence-stripped, then
/// brace-sliced. Returns `None` if nothing parses, at which point the
/// caller should raise `StageError::InvokerParseError`.
pub fn parse_best_effort(raw: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return Some(v);
    }
    let stripped = strip_fences(raw);
    if let Ok(v) = serde_json::from_str::<Value>(stripped) {
        return Some(v);
    }
    let sliced = slice_outermost_braces(stripped)?;
    serde_json::from_str::<Value>(sliced).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_json_directly() {
        assert_eq!(parse_best_effort(r#"{"a":1}"#).unwrap()["a"], 1);
    }

    #[test]
    fn strips_fenced_json_block() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(parse_best_effort(raw).unwrap()["a"], 1);
    }

    #[test]
    fn slices_braces_out_of_surrounding_prose() {
        let raw = "Sure, here you go: {\"a\": 1} hope that helps!";
        assert_eq!(parse_best_effort(raw).unwrap()["a"], 1);
    }

    #[test]
    fn returns_none_for_unparseable_garbage() {
        assert!(parse_best_effort("not json at all").is_none());
    }
}
