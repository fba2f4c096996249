//! Response envelope normalisation.
//!
//! The registry wraps payloads as `{success, data, message}`, but the
//! payload has been observed at `data.data`, at `data`, and as the body
//! itself. Every read goes through these functions, which search those
//! roots in that fixed order.

use crate::errors::{ApiError, ApiResult};
use serde_json::Value;

const FALLBACK_BUSINESS_MESSAGE: &str = "request failed";

fn business_code(error: Option<&Value>) -> Option<String> {
    match error?.get("code")? {
        Value::String(code) => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

/// Rejects envelopes reporting `success: false`.
///
/// # Errors
///
/// Returns [`ApiError::Business`] carrying the envelope's message, error
/// code and details.
pub fn open_envelope(body: Value) -> ApiResult<Value> {
    if body.get("success").and_then(Value::as_bool) != Some(false) {
        return Ok(body);
    }
    let error = body.get("error");
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.and_then(|detail| detail.get("message")).and_then(Value::as_str))
        .or_else(|| error.and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(FALLBACK_BUSINESS_MESSAGE)
        .to_owned();
    let details = error
        .and_then(|detail| detail.get("details"))
        .or_else(|| body.get("data"))
        .filter(|value| !value.is_null())
        .cloned();
    Err(ApiError::Business {
        message,
        code: business_code(error),
        details,
    })
}

fn candidate_roots(body: &Value) -> [Option<&Value>; 3] {
    [body.pointer("/data/data"), body.get("data"), Some(body)]
}

fn is_absent_payload(body: &Value, field: &str) -> bool {
    let data = body.get("data");
    body.is_null()
        || data.is_some_and(Value::is_null)
        || body.pointer("/data/data").is_some_and(Value::is_null)
        || (data.is_none() && body.get("success").is_some() && body.get(field).is_none())
        || candidate_roots(body)
            .into_iter()
            .flatten()
            .any(|root| root.get(field).is_some_and(Value::is_null))
}

/// Extracts the array stored under `field`, or the bare array payload.
///
/// Each candidate root is accepted when it is itself an array or holds an
/// array under `field`. A missing or `null` payload is an empty collection.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when no root holds a recognisable
/// collection.
pub fn extract_collection(body: &Value, field: &str) -> ApiResult<Vec<Value>> {
    for root in candidate_roots(body).into_iter().flatten() {
        if let Some(items) = root.as_array() {
            return Ok(items.clone());
        }
        if let Some(items) = root.get(field).and_then(Value::as_array) {
            return Ok(items.clone());
        }
    }
    if is_absent_payload(body, field) {
        return Ok(Vec::new());
    }
    Err(ApiError::decode(format!(
        "response does not contain a '{field}' collection"
    )))
}

/// Extracts an object payload: `data.data`, else `data`, else the body.
#[must_use]
pub fn extract_object(body: &Value) -> Value {
    candidate_roots(body)
        .into_iter()
        .flatten()
        .find(|root| !root.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"success": true, "data": {"data": {"services": [{"name": "a"}]}}}))]
    #[case(json!({"success": true, "data": {"services": [{"name": "a"}], "total_services": 1}}))]
    #[case(json!({"success": true, "data": [{"name": "a"}]}))]
    #[case(json!({"services": [{"name": "a"}]}))]
    #[case(json!([{"name": "a"}]))]
    fn collections_are_found_at_every_known_root(#[case] body: Value) {
        let items = extract_collection(&body, "services").expect("collection should be found");
        assert_eq!(items, vec![json!({"name": "a"})]);
    }

    #[rstest]
    fn nested_data_takes_precedence_over_outer_data() {
        let body = json!({
            "data": {"data": [{"name": "inner"}], "services": [{"name": "outer"}]}
        });
        let items = extract_collection(&body, "services").expect("collection should be found");
        assert_eq!(items, vec![json!({"name": "inner"})]);
    }

    #[rstest]
    #[case(Value::Null)]
    #[case(json!({"success": true}))]
    #[case(json!({"success": true, "data": null}))]
    #[case(json!({"success": true, "data": {"services": null}}))]
    fn missing_payloads_are_empty(#[case] body: Value) {
        assert_eq!(extract_collection(&body, "services"), Ok(Vec::new()));
    }

    #[rstest]
    #[case(json!({"success": true, "data": {"services": "nope"}}))]
    #[case(json!({"success": true, "data": 42}))]
    #[case(json!({"unexpected": true}))]
    fn unrecognised_shapes_are_decode_errors(#[case] body: Value) {
        assert!(matches!(
            extract_collection(&body, "services"),
            Err(ApiError::Decode(_))
        ));
    }

    #[rstest]
    fn failed_envelopes_become_business_errors() {
        let body = json!({
            "success": false,
            "message": "service already exists",
            "error": {"code": 409, "details": {"name": "svc1"}}
        });

        assert_eq!(
            open_envelope(body),
            Err(ApiError::Business {
                message: "service already exists".to_owned(),
                code: Some("409".to_owned()),
                details: Some(json!({"name": "svc1"})),
            })
        );
    }

    #[rstest]
    fn failed_envelope_message_falls_back_to_error_object() {
        let body = json!({"success": false, "error": {"message": "quota exceeded", "code": "QUOTA"}});
        let Err(ApiError::Business { message, code, .. }) = open_envelope(body) else {
            panic!("expected a business error");
        };
        assert_eq!(message, "quota exceeded");
        assert_eq!(code.as_deref(), Some("QUOTA"));
    }

    #[rstest]
    #[case(json!({"success": true, "data": 1}))]
    #[case(json!([1, 2]))]
    #[case(json!({"data": {"cpu": 0.3}}))]
    fn successful_bodies_pass_through(#[case] body: Value) {
        assert_eq!(open_envelope(body.clone()), Ok(body));
    }

    #[rstest]
    #[case(json!({"data": {"data": {"cpu": 1}}}), json!({"cpu": 1}))]
    #[case(json!({"success": true, "data": {"cpu": 2}}), json!({"cpu": 2}))]
    #[case(json!({"cpu": 3}), json!({"cpu": 3}))]
    fn objects_follow_the_same_precedence(#[case] body: Value, #[case] expected: Value) {
        assert_eq!(extract_object(&body), expected);
    }
}
