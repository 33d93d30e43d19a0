//! Helpers shared by the HTTP backends
//!
//! Credentials must never reach logs or error messages, and remote error
//! bodies are untrusted text of arbitrary length.

use regex::Regex;
use std::sync::LazyLock;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Longest remote error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

static SECRET_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(bearer\s+\S+|\b(?:sk|gsk|vn|key)[-_][A-Za-z0-9_\-]{8,})").ok()
});

/// Mask API key for safe display in logs
///
/// # Examples
/// ```
/// use switchyard_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("gsk_1234567890abcdef"), "gsk_...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= KEY_MASK_VISIBLE_CHARS * 2 {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Strip credential-looking tokens from a remote error message and cap its length
#[must_use]
pub fn redact_secrets(message: &str) -> String {
    let redacted = match SECRET_PATTERN.as_ref() {
        Some(pattern) => pattern.replace_all(message, "[redacted]").into_owned(),
        None => message.to_string(),
    };

    let mut chars = redacted.chars();
    let truncated: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Pick an API key: an explicit non-empty value wins, then the named variable
#[must_use]
pub fn resolve_api_key(explicit: &str, env_var: &str) -> Option<String> {
    if !explicit.trim().is_empty() {
        return Some(explicit.trim().to_string());
    }
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key_long() {
        let masked = mask_api_key("gsk_1234567890abcdefghij");
        assert_eq!(masked, "gsk_...ghij");
        assert!(!masked.contains("567890"));
    }

    #[test]
    fn test_mask_api_key_short() {
        assert_eq!(mask_api_key(""), "****");
        assert_eq!(mask_api_key("12345678"), "****");
    }

    #[test]
    fn test_redact_bearer_and_keys() {
        let redacted = redact_secrets("Authorization: Bearer abc.def rejected for gsk_1234567890abcd");
        assert!(!redacted.contains("abc.def"));
        assert!(!redacted.contains("1234567890"));
        assert!(redacted.contains("rejected for"));
    }

    #[test]
    fn test_redact_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let redacted = redact_secrets(&body);
        assert_eq!(redacted.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(redacted.ends_with("..."));
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        assert_eq!(
            resolve_api_key("  explicit-key ", "SWITCHYARD_TEST_UNSET_VAR"),
            Some("explicit-key".to_string())
        );
        assert_eq!(resolve_api_key("", "SWITCHYARD_TEST_UNSET_VAR"), None);
    }
}
