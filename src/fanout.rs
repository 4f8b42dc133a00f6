//! Listener fanout bridge: the connection-oriented compatibility layer that
//! lets page code post legacy `u2f_sign_request`/`u2f_register_request`
//! messages and receive the results on every registered listener, plus the
//! `runtime.sendMessage` shim with its polled last-error slot.

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::PortMessageError;
use crate::protocol::{
    RegisterRequest, SignRequest, EXTENSION_NOT_FOUND_ERROR, KNOWN_EXTENSION_ID,
    LEGACY_PROTOCOL_VERSION, PROTOCOL_VERSION,
};
use crate::transport::U2fBridge;

/// Listener receiving its own clone of each broadcast payload.
pub type PortListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Append-only, ordered listener registry. No removal, no de-duplication;
/// the registry lives as long as its port.
pub struct MessageEvent {
    listeners: Arc<Mutex<Vec<PortListener>>>,
}

impl MessageEvent {
    fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Arc::new(listener));
    }

    fn handle(&self) -> Arc<Mutex<Vec<PortListener>>> {
        Arc::clone(&self.listeners)
    }
}

/// Connection-like object handed to page code by [`Runtime::connect`].
pub struct Port {
    bridge: Arc<U2fBridge>,
    pub on_message: MessageEvent,
}

impl Port {
    fn new(bridge: Arc<U2fBridge>) -> Self {
        Self {
            bridge,
            on_message: MessageEvent::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "U2f"
    }

    /// Handle one message posted by page code. Messages that are not one of
    /// the two recognized legacy shapes are silently dropped.
    pub fn post_message(&self, message: Value) {
        if let Err(err) = self.route(message) {
            debug!(target = "u2f", error = %err, "ignoring port message");
        }
    }

    fn route(&self, message: Value) -> Result<(), PortMessageError> {
        let object = message.as_object().ok_or(PortMessageError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(PortMessageError::MissingField("type"))?;
        let request_id = object.get("requestId").cloned().unwrap_or(Value::Null);
        let timeout_seconds = object.get("timeoutSeconds").and_then(Value::as_u64);

        match kind {
            "u2f_sign_request" => {
                let sign_requests: Vec<SignRequest> =
                    decode_requests(object.get("signRequests"), "signRequests")?;
                let respond = self.responder("u2f_sign_response", request_id);
                self.bridge.sign(sign_requests, respond, timeout_seconds);
                Ok(())
            }
            "u2f_register_request" => {
                let register_requests: Vec<RegisterRequest> =
                    decode_requests(object.get("registerRequests"), "registerRequests")?;
                // The sign-request list rides along unfiltered on register.
                let sign_requests: Vec<SignRequest> =
                    decode_passthrough(object.get("signRequests"));
                let respond = self.responder("u2f_register_response", request_id);
                self.bridge
                    .register(register_requests, sign_requests, respond, timeout_seconds);
                Ok(())
            }
            other => Err(PortMessageError::UnknownType(other.to_owned())),
        }
    }

    /// Build the response callback: stamp the normalized protocol version,
    /// wrap the payload, and broadcast a clone to every listener in
    /// registration order.
    fn responder(
        &self,
        response_type: &'static str,
        request_id: Value,
    ) -> impl FnOnce(Value) + Send + 'static {
        let listeners = self.on_message.handle();
        move |mut response| {
            if let Some(object) = response.as_object_mut() {
                object.insert("version".into(), Value::String(PROTOCOL_VERSION.into()));
            }
            let wrapped = json!({
                "type": response_type,
                "responseData": response,
                "requestId": request_id,
            });
            // Snapshot the registry so page listeners run without the lock
            // held: a panicking listener must not poison the registry, and a
            // listener registering further listeners must not deadlock.
            let snapshot: Vec<PortListener> = listeners.lock().unwrap().clone();
            for listener in &snapshot {
                listener(wrapped.clone());
            }
        }
    }
}

/// Decode a request list, dropping entries whose version is the legacy
/// `"U2F_V1"` literal while preserving the relative order of the rest.
fn decode_requests<T>(field: Option<&Value>, name: &'static str) -> Result<Vec<T>, PortMessageError>
where
    T: DeserializeOwned,
{
    let entries = field
        .and_then(Value::as_array)
        .ok_or(PortMessageError::MissingField(name))?;
    Ok(decode_entries(entries.iter().filter(|entry| {
        entry.get("version").and_then(Value::as_str) != Some(LEGACY_PROTOCOL_VERSION)
    })))
}

/// Decode an optional list without filtering; an absent field is empty.
fn decode_passthrough<T>(field: Option<&Value>) -> Vec<T>
where
    T: DeserializeOwned,
{
    match field.and_then(Value::as_array) {
        Some(entries) => decode_entries(entries.iter()),
        None => Vec::new(),
    }
}

/// Decode entries one at a time; a malformed entry is skipped so the rest of
/// the request stays alive rather than vanishing without a callback or
/// timeout.
fn decode_entries<'a, T, I>(entries: I) -> Vec<T>
where
    T: DeserializeOwned,
    I: Iterator<Item = &'a Value>,
{
    entries
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                debug!(target = "u2f", error = %err, "skipping malformed request entry");
                None
            }
        })
        .collect()
}

/// Extension-messaging shim exposed next to [`Port`]: a `sendMessage` that
/// only recognizes one extension id and records failures in a last-error
/// slot the caller must poll.
pub struct Runtime {
    bridge: Arc<U2fBridge>,
    last_error: Mutex<Option<String>>,
}

impl Runtime {
    pub fn new(bridge: Arc<U2fBridge>) -> Self {
        Self {
            bridge,
            last_error: Mutex::new(None),
        }
    }

    /// Open a new fanout port backed by this runtime's bridge.
    pub fn connect(&self) -> Port {
        Port::new(Arc::clone(&self.bridge))
    }

    /// The bridge shared by this runtime's ports.
    pub fn bridge(&self) -> &Arc<U2fBridge> {
        &self.bridge
    }

    /// Compare `extension_id` against the recognized id, record the outcome
    /// in the last-error slot, and invoke the callback unconditionally with
    /// no arguments. The callback is never told about the error directly.
    pub fn send_message<F>(&self, extension_id: &str, _message: Value, callback: F)
    where
        F: FnOnce(),
    {
        *self.last_error.lock().unwrap() = if extension_id == KNOWN_EXTENSION_ID {
            None
        } else {
            Some(EXTENSION_NOT_FOUND_ERROR.to_owned())
        };
        callback();
    }

    /// Current contents of the last-error slot.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_entries_are_filtered_in_order() {
        let field = json!([
            { "version": "U2F_V1", "challenge": "a", "keyHandle": "kh-a" },
            { "version": "U2F_V2", "challenge": "b", "keyHandle": "kh-b" },
            { "challenge": "c", "keyHandle": "kh-c" },
            { "version": "U2F_V1", "challenge": "d", "keyHandle": "kh-d" },
        ]);
        let decoded: Vec<SignRequest> = decode_requests(Some(&field), "signRequests").unwrap();
        let handles: Vec<_> = decoded.iter().map(|r| r.key_handle.as_str()).collect();
        assert_eq!(handles, ["kh-b", "kh-c"]);
    }

    #[test]
    fn missing_list_is_an_error() {
        let result: Result<Vec<SignRequest>, _> = decode_requests(None, "signRequests");
        assert!(matches!(result, Err(PortMessageError::MissingField("signRequests"))));
    }

    #[test]
    fn passthrough_treats_absent_as_empty() {
        let decoded: Vec<SignRequest> = decode_passthrough(None);
        assert!(decoded.is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let field = json!([
            { "version": "U2F_V2", "challenge": "c1", "keyHandle": "kh-1" },
            { "version": "U2F_V2", "keyHandle": "kh-no-challenge" },
            { "version": "U2F_V2", "challenge": "c2", "keyHandle": "kh-2" },
        ]);
        let decoded: Vec<SignRequest> = decode_requests(Some(&field), "signRequests").unwrap();
        let handles: Vec<_> = decoded.iter().map(|r| r.key_handle.as_str()).collect();
        assert_eq!(handles, ["kh-1", "kh-2"]);
    }
}
