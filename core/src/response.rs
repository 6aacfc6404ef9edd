//! The envelope around one Mailin service response.
//!
//! # Design
//! The service always answers with a JSON object. Failure is signalled by a
//! non-empty `errorMsg` key; the payload of a successful call usually sits
//! under `result`, though some actions use another key (`folder_id`) or put
//! their entries at the top level. `Response` decides success once, at
//! construction, and never fails itself: a body that is not a non-empty JSON
//! object simply yields an unsuccessful, empty envelope.

use serde_json::{Map, Value};

use crate::error::ApiError;

/// Key under which the service places its primary payload.
pub const RESULT_KEY: &str = "result";

/// Key under which the service reports errors.
pub const ERROR_KEY: &str = "errorMsg";

const UNKNOWN_ERROR: &str = "Unknown error";

/// Parsed success/error/data wrapper around one response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    data: Map<String, Value>,
    success: bool,
    /// Set when no body was received at all.
    transport_error: Option<String>,
}

impl Response {
    /// Decode a raw response body.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(data)) if !data.is_empty() => {
                let success = data.get(ERROR_KEY).map_or(true, is_blank);
                Self {
                    data,
                    success,
                    transport_error: None,
                }
            }
            _ => Self::default(),
        }
    }

    /// A failed envelope with no data, carrying the transport error text.
    pub fn from_error(error: &ApiError) -> Self {
        Self {
            data: Map::new(),
            success: false,
            transport_error: Some(error.to_string()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// The decoded payload, whatever the outcome.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The decoded payload on success, otherwise an empty map.
    pub fn data_on_success(&self) -> Map<String, Value> {
        if self.success {
            self.data.clone()
        } else {
            Map::new()
        }
    }

    /// Consuming variant of [`Response::data_on_success`].
    pub fn into_data_on_success(self) -> Map<String, Value> {
        if self.success {
            self.data
        } else {
            Map::new()
        }
    }

    /// The value under `result`, or `None` on failure or when absent.
    pub fn result(&self) -> Option<&Value> {
        self.result_for(RESULT_KEY)
    }

    /// The value under `key`, or `None` on failure or when absent.
    pub fn result_for(&self, key: &str) -> Option<&Value> {
        if !self.success {
            return None;
        }
        self.data.get(key).filter(|value| !value.is_null())
    }

    /// True when the call succeeded and `result` is exactly `expected`.
    pub fn result_is(&self, expected: &str) -> bool {
        self.result().and_then(Value::as_str) == Some(expected)
    }

    /// Raw indexed access into the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The transport error text when no body was received.
    pub fn transport_error(&self) -> Option<&str> {
        self.transport_error.as_deref()
    }

    /// The service or transport error message, "Unknown error" for a failure
    /// without one, and an empty string on success.
    pub fn error_message(&self) -> String {
        if let Some(message) = &self.transport_error {
            return message.clone();
        }
        match self.data.get(ERROR_KEY) {
            Some(Value::Null) | None if self.success => String::new(),
            Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Whether a JSON value counts as "no value" in the service's conventions:
/// null, `false`, `0`, `""`, `"0"`, and empty arrays or objects.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_without_error_is_successful() {
        let response = Response::from_body(r#"{"result":"OK"}"#);
        assert!(response.is_successful());
        assert_eq!(response.result(), Some(&json!("OK")));
        assert_eq!(response.error_message(), "");
    }

    #[test]
    fn error_message_marks_failure() {
        let response = Response::from_body(r#"{"errorMsg":"Invalid key","result":"OK"}"#);
        assert!(!response.is_successful());
        assert_eq!(response.result(), None);
        assert_eq!(response.error_message(), "Invalid key");
        assert!(response.data_on_success().is_empty());
        assert_eq!(response.data().len(), 2);
    }

    #[test]
    fn empty_error_message_is_still_success() {
        let response = Response::from_body(r#"{"errorMsg":"","result":"OK"}"#);
        assert!(response.is_successful());
        assert_eq!(response.error_message(), "");
    }

    #[test]
    fn undecodable_body_is_empty_failure() {
        for body in ["not json", "", "{}", "[]", "42", r#""text""#, "null"] {
            let response = Response::from_body(body);
            assert!(!response.is_successful(), "{body:?} should fail");
            assert!(response.data().is_empty(), "{body:?} should carry no data");
            assert_eq!(response.error_message(), "Unknown error");
        }
    }

    #[test]
    fn result_for_custom_key() {
        let response = Response::from_body(r#"{"folder_id":12}"#);
        assert_eq!(response.result_for("folder_id"), Some(&json!(12)));
        assert_eq!(response.result(), None);
    }

    #[test]
    fn result_is_compares_literal() {
        assert!(Response::from_body(r#"{"result":"success"}"#).result_is("success"));
        assert!(!Response::from_body(r#"{"result":"failure"}"#).result_is("success"));
        assert!(!Response::from_body(r#"{"result":1}"#).result_is("success"));
    }

    #[test]
    fn transport_error_becomes_failed_envelope() {
        let response = Response::from_error(&ApiError::Http {
            status: 502,
            body: "bad gateway".to_string(),
        });
        assert!(!response.is_successful());
        assert!(response.data().is_empty());
        assert_eq!(response.result(), None);
        assert_eq!(response.error_message(), "HTTP 502: bad gateway");
        assert_eq!(response.transport_error(), Some("HTTP 502: bad gateway"));

        let refused = Response::from_error(&ApiError::Transport("refused".to_string()));
        assert!(refused.data().is_empty());
        assert_eq!(refused.get(ERROR_KEY), None);
        assert_eq!(refused.error_message(), "transport failed: refused");
    }

    #[test]
    fn service_error_is_not_a_transport_error() {
        let response = Response::from_body(r#"{"errorMsg":"Invalid key"}"#);
        assert_eq!(response.transport_error(), None);
    }

    #[test]
    fn blank_values() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!("0"), json!([]), json!({})] {
            assert!(is_blank(&value), "{value} should be blank");
        }
        for value in [json!(true), json!(3), json!("a"), json!([0]), json!({"a": 1})] {
            assert!(!is_blank(&value), "{value} should not be blank");
        }
    }
}
