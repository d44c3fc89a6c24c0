//! Wire types for the line-delimited JSON-RPC protocol.
//!
//! A request is a single JSON object terminated by the frame delimiter:
//!
//! ```text
//! {"id":1,"method":"echo","params":["foo","bar"]}\n
//! ```
//!
//! and the matching response carries either a result or an error:
//!
//! ```text
//! {"result":["foo","bar"],"error":null}\n
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request ID, strictly increasing per client starting at 1.
    pub id: u64,
    pub method: String,
    /// Positional parameters, order preserved.
    pub params: Vec<Value>,
}

impl Request {
    /// Create a new request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// Incoming response.
///
/// Both fields are optional on the wire; unknown fields such as an echoed
/// `id` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl Response {
    /// Successful response.
    #[cfg(test)]
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    #[cfg(test)]
    pub fn failure(error: Value) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }

    /// The error value, if the server supplied a non-empty one.
    ///
    /// `null`, `false`, `""`, `[]` and `{}` all count as "no error".
    pub fn application_error(&self) -> Option<&Value> {
        self.error.as_ref().filter(|value| !is_empty_value(value))
    }

    /// Split into the final outcome, treating a missing result as `null`.
    pub fn into_result(self) -> Result<Value, Value> {
        if self.application_error().is_none() {
            return Ok(self.result.unwrap_or(Value::Null));
        }
        Err(self.error.unwrap_or(Value::Null))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_serialize_field_order() {
        let request = Request::new(1, "echo", vec![json!("foo"), json!("bar")]);
        let encoded = serde_json::to_string(&request).unwrap();
        assert_eq!(encoded, r#"{"id":1,"method":"echo","params":["foo","bar"]}"#);
    }

    #[test]
    fn test_request_serialize_empty_params() {
        let request = Request::new(7, "ping", Vec::new());
        let encoded = serde_json::to_string(&request).unwrap();
        assert_eq!(encoded, r#"{"id":7,"method":"ping","params":[]}"#);
    }

    #[test]
    fn test_response_deserialize_success() {
        let response: Response =
            serde_json::from_str(r#"{"result":["foo","bar"],"error":null}"#).unwrap();
        assert_eq!(response.application_error(), None);
        assert_eq!(response.into_result(), Ok(json!(["foo", "bar"])));
    }

    #[test]
    fn test_response_deserialize_error() {
        let response: Response =
            serde_json::from_str(r#"{"result":null,"error":"no such method"}"#).unwrap();
        assert_eq!(response.application_error(), Some(&json!("no such method")));
        assert_eq!(response.into_result(), Err(json!("no such method")));
    }

    #[test]
    fn test_response_structured_error_kept_verbatim() {
        let error = json!({"code": -32601, "message": "Method not found"});
        let response: Response =
            serde_json::from_value(json!({"result": null, "error": error.clone()})).unwrap();
        assert_eq!(response.into_result(), Err(error));
    }

    #[test]
    fn test_response_empty_error_values_are_ignored() {
        for empty in [json!(null), json!(false), json!(""), json!([]), json!({})] {
            let response = Response {
                result: Some(json!(42)),
                error: Some(empty.clone()),
            };
            assert_eq!(response.into_result(), Ok(json!(42)), "error = {}", empty);
        }
    }

    #[test]
    fn test_response_with_neither_field_is_null_result() {
        let response: Response = serde_json::from_str(r#"{"id":3}"#).unwrap();
        assert_eq!(response, Response::default());
        assert_eq!(response.into_result(), Ok(Value::Null));
    }

    #[test]
    fn test_response_constructors() {
        assert_eq!(Response::success(json!(1)).into_result(), Ok(json!(1)));
        assert_eq!(Response::failure(json!("bad")).into_result(), Err(json!("bad")));
    }
}
