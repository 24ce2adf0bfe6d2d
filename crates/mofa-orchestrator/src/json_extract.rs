//! Three-step JSON extraction from an LLM reply: direct parse, fenced code
//! block, then first balanced `{ ... }` substring. Two call sites need this
//! with different failure behaviour (one raises, one falls back to a safe
//! default), so this module only extracts text and leaves parsing/fallback
//! to the caller.

use regex::Regex;
use std::sync::OnceLock;

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap())
}

fn braces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

/// Returns the first candidate JSON text found by the three-step rule,
/// trying each step's result as actual JSON before moving to the next.
pub fn extract_json_value(text: &str) -> Result<serde_json::Value, String> {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        return Ok(v);
    }

    if let Some(caps) = fenced_json_re().captures(text) {
        let candidate = caps.get(1).unwrap().as_str();
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(candidate) {
            return Ok(v);
        }
    }

    if let Some(m) = braces_re().find(text) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
            return Ok(v);
        }
    }

    let truncated: String = text.chars().take(300).collect();
    Err(format!("could not extract valid JSON from reply: {truncated}"))
}

pub fn extract_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, String> {
    let value = extract_json_value(text)?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_json_parses() {
        let v = extract_json_value(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn fenced_json_block_parses() {
        let text = "here you go:\n```json\n{\"a\": 2}\n```\nthanks";
        let v = extract_json_value(text).unwrap();
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn plain_fenced_block_parses() {
        let text = "```\n{\"a\": 3}\n```";
        let v = extract_json_value(text).unwrap();
        assert_eq!(v["a"], 3);
    }

    #[test]
    fn bare_braces_parse() {
        let text = "The plan is {\"a\": 4} as requested.";
        let v = extract_json_value(text).unwrap();
        assert_eq!(v["a"], 4);
    }

    #[test]
    fn total_failure_errors_with_truncated_text() {
        let err = extract_json_value("no json here at all").unwrap_err();
        assert!(err.contains("no json here"));
    }
}
