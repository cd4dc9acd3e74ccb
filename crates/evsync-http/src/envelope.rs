//! Response body decoding
//!
//! The API wraps payloads as `{ "data": ..., "error": ... }`, but older
//! endpoints answer with the bare payload. Both are accepted.

use evsync_core::{SourceError, SourceErrorKind};
use serde_json::{Map, Value};

/// Keys under which a collection body may nest its list
const LIST_KEYS: [&str; 2] = ["evidence", "items"];

fn is_envelope(map: &Map<String, Value>) -> bool {
    !map.contains_key("id") && (map.contains_key("data") || map.contains_key("error"))
}

/// Human-readable message from an `error` value
pub(crate) fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("detail"))
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        other => other.to_string(),
    }
}

/// Strip the `{ data, error }` wrapper, failing on a non-null `error`
///
/// # Errors
/// - `SourceErrorKind::Api` when the envelope carries an error
pub fn unwrap_envelope(body: Value) -> Result<Value, SourceError> {
    match body {
        Value::Object(mut map) if is_envelope(&map) => {
            match map.remove("error") {
                None | Some(Value::Null) => {}
                Some(error) => {
                    return Err(SourceError::new(
                        SourceErrorKind::Api,
                        None,
                        error_message(&error),
                    ))
                }
            }
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Pull the list of raw records out of an unwrapped collection body
///
/// # Errors
/// - `SourceErrorKind::Decode` when the body is a scalar
pub fn extract_records(data: Value) -> Result<Vec<Value>, SourceError> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in LIST_KEYS {
                if matches!(map.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return Ok(items);
                    }
                }
            }
            Ok(vec![Value::Object(map)])
        }
        other => Err(SourceError::decode(format!(
            "expected array or object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_passes_through() {
        let body = json!([{"id": "e1"}]);
        assert_eq!(unwrap_envelope(body.clone()).unwrap(), body);
    }

    #[test]
    fn envelope_data_is_unwrapped() {
        let data = unwrap_envelope(json!({"data": [{"id": "e1"}], "error": null})).unwrap();
        assert_eq!(extract_records(data).unwrap().len(), 1);
    }

    #[test]
    fn envelope_error_fails() {
        let err = unwrap_envelope(json!({"data": null, "error": {"message": "pipeline offline"}}))
            .unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Api);
        assert_eq!(err.message, "pipeline offline");

        let err = unwrap_envelope(json!({"error": "nope"})).unwrap_err();
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn record_with_error_field_is_not_an_envelope() {
        let body = json!({"id": "e1", "status": "failed", "error": "ocr timeout"});
        assert_eq!(unwrap_envelope(body.clone()).unwrap(), body);
    }

    #[test]
    fn nested_lists_are_found() {
        let records = extract_records(json!({"evidence": [{"id": "a"}, {"id": "b"}], "total": 2}))
            .unwrap();
        assert_eq!(records.len(), 2);

        let records = extract_records(json!({"items": []})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn single_object_and_null() {
        assert_eq!(extract_records(json!({"id": "e1"})).unwrap().len(), 1);
        assert!(extract_records(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn scalars_are_rejected() {
        let err = extract_records(json!("ok")).unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Decode);
    }
}
