//! Inbound response normalization. Host-reported errors are logged for
//! diagnostics and the `errorMessage` field is stripped before the payload
//! reaches the page callback; the callback only ever sees the field's
//! absence (or a timeout error code).

use serde_json::Value;
use tracing::info;

/// Strip the host error indicator from `response`, logging it if present.
/// Purely a normalization pass; holds no state.
pub fn normalize_response(mut response: Value) -> Value {
    if let Some(object) = response.as_object_mut() {
        if let Some(message) = object.remove("errorMessage") {
            // Empty and null messages are stripped without the diagnostic.
            let worth_logging = match &message {
                Value::Null => false,
                Value::String(text) => !text.is_empty(),
                _ => true,
            };
            if worth_logging {
                info!(target = "u2f", error = %message, "error response from host");
            }
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_error_message() {
        let normalized = normalize_response(json!({
            "errorMessage": "device busy",
            "errorCode": 2,
            "keyHandle": "kh",
        }));
        assert_eq!(normalized, json!({ "errorCode": 2, "keyHandle": "kh" }));
    }

    #[test]
    fn leaves_clean_responses_alone() {
        let payload = json!({ "registrationData": "data", "clientData": "cd" });
        assert_eq!(normalize_response(payload.clone()), payload);
    }

    #[test]
    fn tolerates_non_object_payloads() {
        assert_eq!(normalize_response(json!("ok")), json!("ok"));
    }
}
