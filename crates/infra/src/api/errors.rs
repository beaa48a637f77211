//! CRM error classification with retry metadata
//!
//! The CRM reports most failures as a 200 response whose body carries an
//! `error` code. The static policy table below is the contract the rest of
//! the client depends on: it decides whether a code is retryable, what the
//! caller (or the retry loop) should do about it, and how long to back off
//! first.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// What a caller (or the retry loop) should do about a classified error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Refresh the access token, then retry
    Refresh,
    /// Back off for the policy delay, then retry
    Wait,
    /// Installation is broken; the app must be reinstalled
    Reinstall,
    /// OAuth client id/secret or refresh token are wrong
    CheckCredentials,
    /// The CRM user lacks permission for the method
    CheckPermissions,
    /// CRM-side transport fault; nothing the client can do
    SystemCheck,
    /// Unrecognized code; treated as fatal
    Unknown,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Wait => "wait",
            Self::Reinstall => "reinstall",
            Self::CheckCredentials => "check_credentials",
            Self::CheckPermissions => "check_permissions",
            Self::SystemCheck => "system_check",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry policy attributes for one error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub retryable: bool,
    pub action: RecommendedAction,
    pub delay_ms: u64,
}

impl ErrorPolicy {
    const fn new(retryable: bool, action: RecommendedAction, delay_ms: u64) -> Self {
        Self { retryable, action, delay_ms }
    }

    /// Look up the policy for an error code
    ///
    /// Unknown codes default to non-retryable with no action and no delay.
    pub fn for_code(code: &str) -> Self {
        use RecommendedAction as Action;

        match code {
            "expired_token" => Self::new(true, Action::Refresh, 0),
            "invalid_token" => Self::new(false, Action::Reinstall, 0),
            "invalid_grant" => Self::new(false, Action::CheckCredentials, 0),
            "invalid_client" => Self::new(false, Action::CheckCredentials, 0),
            "QUERY_LIMIT_EXCEEDED" => Self::new(true, Action::Wait, 500),
            "ERROR_METHOD_NOT_FOUND" => Self::new(false, Action::CheckPermissions, 0),
            "NO_AUTH_FOUND" => Self::new(false, Action::Reinstall, 0),
            "INTERNAL_SERVER_ERROR" => Self::new(true, Action::Wait, 1000),
            "error_php_lib_curl" => Self::new(false, Action::SystemCheck, 0),
            _ => Self::new(false, Action::Unknown, 0),
        }
    }

    /// Default human message for codes the table knows about
    fn default_message(code: &str) -> Option<&'static str> {
        match code {
            "expired_token" => Some("Access token has expired"),
            "invalid_token" => Some("Access token is invalid"),
            "invalid_grant" => Some("Refresh token is invalid or revoked"),
            "invalid_client" => Some("OAuth client credentials were rejected"),
            "QUERY_LIMIT_EXCEEDED" => Some("Request quota exceeded"),
            "ERROR_METHOD_NOT_FOUND" => Some("Method not found or not permitted"),
            "NO_AUTH_FOUND" => Some("No authorization found for this installation"),
            "INTERNAL_SERVER_ERROR" => Some("CRM internal server error"),
            "error_php_lib_curl" => Some("CRM-side transport failure"),
            _ => None,
        }
    }
}

/// A failed CRM call, carrying its retry contract
///
/// Constructed either by [`classify`] from a raw API error payload or by
/// one of the constructors for failures that never reach the CRM's error
/// envelope (configuration, HTTP status, transport, refresh, batch).
///
/// Serializes to a structured record of code/message/retryable/action/delay
/// with the wrapped cause rendered as text.
#[derive(Debug, Error, Serialize)]
#[error("{code}: {message}")]
pub struct CallError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Whether the retry loop may resolve this internally
    pub retryable: bool,
    /// Recommended handling
    pub action: RecommendedAction,
    /// Back-off before a retry, in milliseconds
    pub delay_ms: u64,
    /// Wrapped cause, if any
    #[serde(serialize_with = "serialize_cause")]
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn serialize_cause<S: serde::Serializer>(
    source: &Option<Box<dyn std::error::Error + Send + Sync>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match source {
        Some(cause) => serializer.serialize_some(&cause.to_string()),
        None => serializer.serialize_none(),
    }
}

impl CallError {
    /// Build an error for `code` with the table's policy attached
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let policy = ErrorPolicy::for_code(&code);
        Self {
            code,
            message: message.into(),
            retryable: policy.retryable,
            action: policy.action,
            delay_ms: policy.delay_ms,
            source: None,
        }
    }

    /// Non-retryable configuration error (missing credentials or secrets)
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            code: "configuration_error".to_string(),
            message: message.into(),
            retryable: false,
            action: RecommendedAction::CheckCredentials,
            delay_ms: 0,
            source: None,
        }
    }

    /// Non-retryable HTTP transport-status failure (non-2xx)
    pub fn http_status(status: u16, body: String) -> Self {
        let message = if body.is_empty() {
            format!("CRM returned HTTP status {status}")
        } else {
            format!("CRM returned HTTP status {status}: {body}")
        };
        Self {
            code: "http_error".to_string(),
            message,
            retryable: false,
            action: RecommendedAction::Unknown,
            delay_ms: 0,
            source: None,
        }
    }

    /// Network failure after exhausting the transient-retry budget
    pub fn network(
        attempts: u32,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code: "network_error".to_string(),
            message: format!("network failure after {attempts} attempts: {source}"),
            retryable: false,
            action: RecommendedAction::SystemCheck,
            delay_ms: 0,
            source: Some(Box::new(source)),
        }
    }

    /// Token refresh failed; always fatal for the current call
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self {
            code: "refresh_failed".to_string(),
            message: message.into(),
            retryable: false,
            action: RecommendedAction::CheckCredentials,
            delay_ms: 0,
            source: None,
        }
    }

    /// Invalid batch input; fails before any HTTP
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self {
            code: "invalid_batch".to_string(),
            message: message.into(),
            retryable: false,
            action: RecommendedAction::Unknown,
            delay_ms: 0,
            source: None,
        }
    }

    /// Attach a wrapped cause
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the retry loop may resolve this error internally
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Back-off to apply before a retry
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Recommended handling for this error
    pub fn recommended_action(&self) -> RecommendedAction {
        self.action
    }
}

/// Classify a raw API error payload into a [`CallError`]
///
/// Accepts the CRM's `{error, error_description}` envelope, a bare code
/// string, or anything else (mapped to an unknown code). The message falls
/// back from the payload's description to the table's default description
/// to a generic `API error: <code>` string.
pub fn classify(payload: &Value) -> CallError {
    let (code, description) = match payload {
        Value::String(code) => (code.as_str(), None),
        Value::Object(map) => {
            let code = map.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            let description = map
                .get("error_description")
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty());
            (code, description)
        }
        _ => ("unknown_error", None),
    };

    let message = description
        .map(str::to_string)
        .or_else(|| ErrorPolicy::default_message(code).map(str::to_string))
        .unwrap_or_else(|| format!("API error: {code}"));

    CallError::from_code(code, message)
}
