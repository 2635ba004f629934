//! Error message normalization.
//!
//! Providers report failures as whatever their HTTP stack hands back, often
//! `HTTP 404: {"error":{"message":"..."}}` with embedded newlines. The
//! [`ErrorNormalizer`] reduces these to one short, human-readable line before
//! any result leaves the engine.

use serde_json::Value;

/// Default character budget for normalized messages.
pub const DEFAULT_ERROR_MAX_CHARS: usize = 140;

const ELLIPSIS: char = '…';

/// Pure function object mapping raw provider errors to short messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorNormalizer {
    max_chars: usize,
}

impl Default for ErrorNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_MAX_CHARS)
    }
}

impl ErrorNormalizer {
    /// Creates a normalizer that never returns more than `max_chars` characters.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Returns the configured character budget.
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Normalizes one raw message.
    ///
    /// Steps: flatten line breaks; for `HTTP <code>: <rest>` try `<rest>` as
    /// JSON (otherwise the whole text) and pull out `error.message`, `error`,
    /// `message` or `detail`; if nothing is found keep the text without its
    /// status prefix; collapse space runs; truncate with an ellipsis.
    pub fn normalize(&self, raw: &str) -> String {
        let flat = raw.replace(['\r', '\n'], " ");
        let flat = flat.trim();
        if flat.is_empty() {
            return String::new();
        }

        let body = strip_http_prefix(flat).unwrap_or(flat);
        let message = extract_json_message(body).unwrap_or_else(|| body.to_string());

        self.truncate(collapse_spaces(&message))
    }

    fn truncate(&self, s: String) -> String {
        if s.chars().count() <= self.max_chars {
            return s;
        }
        if self.max_chars == 0 {
            return String::new();
        }
        let mut out: String = s.chars().take(self.max_chars - 1).collect();
        out.push(ELLIPSIS);
        out
    }
}

/// Returns the text after `HTTP <digits>:`, or `None` if `s` has no such prefix.
fn strip_http_prefix(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("HTTP ")?;
    let (code, tail) = rest.split_once(':')?;
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(tail.trim())
}

fn extract_json_message(candidate: &str) -> Option<String> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let obj = value.as_object()?;

    let found = match obj.get("error") {
        Some(Value::Object(err)) => err.get("message").and_then(Value::as_str),
        Some(Value::String(err)) => Some(err.as_str()),
        _ => None,
    }
    .or_else(|| obj.get("message").and_then(Value::as_str))
    .or_else(|| obj.get("detail").and_then(Value::as_str))?;

    let found = found.trim();
    (!found.is_empty()).then(|| found.to_string())
}

fn collapse_spaces(s: &str) -> String {
    s.split(' ').filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}
