//! Canonical `{error, code, retry}` shape for third-party failures.
//!
//! The generated error-handler node performs this classification inside the
//! engine; [`CanonicalError::classify`] is the same rule in Rust so callers
//! can recognise and interpret those payloads in execution output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AUTHENTICATION_FAILED_MESSAGE: &str =
    "Authentication failed. Please reconnect your Google account.";
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

const EXPIRED_GRANT_REASONS: [&str; 2] = ["invalid_grant", "invalid_token"];

/// Function-node body of the generated error handler.
pub(crate) const ERROR_HANDLER_CODE: &str = r#"return items.map(item => {
  const payload = item.json || {};
  if (!payload.error) {
    return item;
  }
  const error = payload.error;
  const reason = typeof error === 'string' ? error : error.error;
  const code = typeof error === 'object' ? Number(error.code) || undefined : undefined;
  if (reason === 'invalid_grant' || reason === 'invalid_token') {
    return { json: { error: 'Authentication failed. Please reconnect your Google account.', code: 401, retry: false } };
  }
  if (code === 429) {
    return { json: { error: 'Rate limit exceeded. Please try again later.', code: 429, retry: true } };
  }
  const message = typeof error === 'string' ? error : error.message;
  return { json: { error: message || 'Unknown error occurred', code: code || 500, retry: false } };
});"#;

/// A third-party failure after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalError {
    pub error: String,
    pub code: u16,
    pub retry: bool,
}

impl CanonicalError {
    /// Classifies a raw upstream `error` value.
    ///
    /// Expired or revoked grants become 401, code 429 becomes a retryable
    /// rate limit, and anything else keeps its message and code (default 500).
    #[must_use]
    pub fn classify(error: &Value) -> Self {
        let reason = match error {
            Value::String(s) => Some(s.as_str()),
            other => other.get("error").and_then(Value::as_str),
        };
        if reason.is_some_and(|r| EXPIRED_GRANT_REASONS.contains(&r)) {
            return Self {
                error: AUTHENTICATION_FAILED_MESSAGE.to_string(),
                code: 401,
                retry: false,
            };
        }

        let code = error.get("code").and_then(status_code);
        if code == Some(429) {
            return Self {
                error: RATE_LIMITED_MESSAGE.to_string(),
                code: 429,
                retry: true,
            };
        }

        let message = match error {
            Value::String(s) => Some(s.as_str()),
            other => other.get("message").and_then(Value::as_str),
        };
        Self {
            error: message
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_ERROR_MESSAGE)
                .to_string(),
            code: code.unwrap_or(500),
            retry: false,
        }
    }

    /// Finds an already-normalized error in execution output.
    ///
    /// Looks at the output itself, at each element of an item list, and at
    /// each item's `json` field.
    #[must_use]
    pub fn from_output(output: &Value) -> Option<Self> {
        match output {
            Value::Array(items) => items.iter().find_map(Self::from_output),
            Value::Object(map) => Self::from_candidate(output)
                .or_else(|| map.get("json").and_then(Self::from_candidate)),
            _ => None,
        }
    }

    fn from_candidate(value: &Value) -> Option<Self> {
        let shaped = value.get("error").is_some_and(Value::is_string)
            && value.get("code").is_some_and(Value::is_u64)
            && value.get("retry").is_some_and(Value::is_boolean);
        if !shaped {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        self.code == 401
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.code == 429
    }
}

fn status_code(value: &Value) -> Option<u16> {
    let code = match value {
        Value::Number(n) => n.as_u64().and_then(|c| u16::try_from(c).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    code.filter(|code| *code != 0)
}
