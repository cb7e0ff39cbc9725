//! Result envelopes returned by every tool
//!
//! Success: `{success: true, data, message?}`.
//! Failure: `{success: false, error, details}`; Kibo HTTP failures are
//! mapped to user-facing categories.

use serde::Serialize;
use serde_json::Value;

use crate::Error;
use crate::protocol::{Content, ToolsCallResult};

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ToolOutcome {
    /// Successful outcome carrying `data`
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            details: None,
        }
    }

    /// Attach a human-readable message to a successful outcome
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Failed outcome
    pub fn failure(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            details: Some(details.into()),
        }
    }

    /// Map an API failure to its category. `context` (what the tool was
    /// trying to do) is the fallback detail.
    pub fn from_error(err: &Error, context: impl Into<String>) -> Self {
        let context = context.into();
        match err {
            Error::HttpStatus { status, body } => {
                let api_message = api_error_message(body);
                match status {
                    400 => Self::failure(
                        "Bad request - invalid parameters",
                        api_message.unwrap_or(context),
                    ),
                    401 => Self::failure(
                        "Unauthorized - authentication failed",
                        "Please check your API credentials",
                    ),
                    403 => Self::failure(
                        "Forbidden - insufficient permissions",
                        "Your account does not have permission for this operation",
                    ),
                    404 => Self::failure(
                        "Resource not found",
                        api_message
                            .unwrap_or_else(|| "The requested resource was not found".to_string()),
                    ),
                    429 => Self::failure(
                        "Rate limit exceeded",
                        "Too many requests - please try again later",
                    ),
                    500 => Self::failure(
                        "Internal server error",
                        "A server error occurred - please try again later",
                    ),
                    other => Self::failure(
                        format!("HTTP {other} error"),
                        api_message.unwrap_or(context),
                    ),
                }
            }
            Error::Transport(_) => {
                Self::failure("Network error", "Unable to connect to Kibo Commerce API")
            }
            other => Self::failure(other.to_string(), context),
        }
    }

    /// Success for `Ok`, categorized failure for `Err`
    pub fn from_result(result: crate::Result<Value>, context: impl FnOnce() -> String) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::from_error(&e, context()),
        }
    }

    /// `true` for successful outcomes
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Payload of a successful outcome
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Message attached to a successful outcome
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Error category of a failed outcome
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Details of a failed outcome
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Pretty-printed envelope
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn to_text(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Wrap the envelope as MCP text content
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn into_call_result(self) -> crate::Result<ToolsCallResult> {
        Ok(ToolsCallResult {
            content: vec![Content::Text {
                text: self.to_text()?,
            }],
            is_error: !self.success,
        })
    }
}

/// `message` or `errorMessage` from a Kibo error body
fn api_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    ["message", "errorMessage"]
        .iter()
        .filter_map(|key| parsed.get(*key).and_then(Value::as_str))
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn http(status: u16, body: &str) -> Error {
        Error::HttpStatus {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn success_envelope_shape() {
        let outcome = ToolOutcome::success(json!({"a": 1})).with_message("done");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "data": {"a": 1}, "message": "done"})
        );
    }

    #[test]
    fn failure_envelope_shape() {
        let outcome = ToolOutcome::failure("Resource not found", "gone");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": false, "error": "Resource not found", "details": "gone"})
        );
    }

    #[test]
    fn bad_request_uses_api_message() {
        let outcome = ToolOutcome::from_error(&http(400, r#"{"message":"pageSize too big"}"#), "ctx");
        assert_eq!(outcome.error(), Some("Bad request - invalid parameters"));
        assert_eq!(outcome.details(), Some("pageSize too big"));
    }

    #[test]
    fn bad_request_falls_back_to_context() {
        let outcome = ToolOutcome::from_error(&http(400, "not json"), "Failed to search orders");
        assert_eq!(outcome.details(), Some("Failed to search orders"));
    }

    #[test]
    fn not_found_prefers_error_message_field() {
        let outcome =
            ToolOutcome::from_error(&http(404, r#"{"errorMessage":"Order 9 missing"}"#), "ctx");
        assert_eq!(outcome.error(), Some("Resource not found"));
        assert_eq!(outcome.details(), Some("Order 9 missing"));

        let outcome = ToolOutcome::from_error(&http(404, ""), "ctx");
        assert_eq!(outcome.details(), Some("The requested resource was not found"));
    }

    #[test]
    fn fixed_categories() {
        let cases = [
            (401, "Unauthorized - authentication failed", "Please check your API credentials"),
            (
                403,
                "Forbidden - insufficient permissions",
                "Your account does not have permission for this operation",
            ),
            (429, "Rate limit exceeded", "Too many requests - please try again later"),
            (500, "Internal server error", "A server error occurred - please try again later"),
        ];
        for (status, error, details) in cases {
            let outcome = ToolOutcome::from_error(&http(status, r#"{"message":"x"}"#), "ctx");
            assert_eq!(outcome.error(), Some(error), "status {status}");
            assert_eq!(outcome.details(), Some(details), "status {status}");
        }
    }

    #[test]
    fn other_status_is_generic() {
        let outcome = ToolOutcome::from_error(&http(502, "{}"), "Failed to search products");
        assert_eq!(outcome.error(), Some("HTTP 502 error"));
        assert_eq!(outcome.details(), Some("Failed to search products"));
    }

    #[test]
    fn transport_failure_is_network_error() {
        let outcome = ToolOutcome::from_error(&Error::Transport("refused".into()), "ctx");
        assert_eq!(outcome.error(), Some("Network error"));
        assert_eq!(outcome.details(), Some("Unable to connect to Kibo Commerce API"));
    }

    #[test]
    fn auth_failure_keeps_message() {
        let outcome =
            ToolOutcome::from_error(&Error::Authentication("HTTP 401".into()), "Failed to x");
        assert_eq!(outcome.error(), Some("Kibo authentication failed: HTTP 401"));
        assert_eq!(outcome.details(), Some("Failed to x"));
    }

    #[test]
    fn call_result_flags_failures() {
        let result = ToolOutcome::failure("e", "d").into_call_result().unwrap();
        assert!(result.is_error);
        let Content::Text { text } = &result.content[0];
        assert!(text.contains("\"success\": false"));
    }
}
