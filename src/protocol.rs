//! Wire model shared with the privileged host, plus the fixed protocol
//! constants. Payloads coming back from the host stay opaque
//! (`serde_json::Value`); only the outbound request side is typed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Deadline applied when the caller supplies no timeout (or a zero one).
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Error code delivered to the page callback when a request times out.
pub const TIMEOUT_ERROR_CODE: u64 = 5;

/// Legacy protocol version filtered out of forwarded request lists.
pub const LEGACY_PROTOCOL_VERSION: &str = "U2F_V1";

/// Protocol version stamped onto responses broadcast through a port.
pub const PROTOCOL_VERSION: &str = "U2F_V2";

/// The one extension id `Runtime::send_message` recognizes.
pub const KNOWN_EXTENSION_ID: &str = "kmendfapggjehodndflmmgagdbamhnfd";

/// Last-error message recorded for any other extension id.
pub const EXTENSION_NOT_FOUND_ERROR: &str = "Not found";

/// Host event name carrying outbound requests.
pub const REQUEST_EVENT: &str = "U2FRequest";

/// Host event name carrying inbound responses.
pub const RESPONSE_EVENT: &str = "U2FRequestResponse";

/// One entry of a register operation's `requests` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub challenge: String,
    #[serde(rename = "appId", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// One entry of a `signRequests` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub challenge: String,
    #[serde(rename = "keyHandle")]
    pub key_handle: String,
    #[serde(rename = "appId", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// Key descriptor supplied by the legacy calling convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "keyHandle")]
    pub key_handle: String,
}

/// Outbound request envelope, tagged by its `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestEnvelope {
    #[serde(rename = "register")]
    Register {
        requests: Vec<RegisterRequest>,
        #[serde(rename = "signRequests")]
        sign_requests: Vec<SignRequest>,
    },
    #[serde(rename = "sign")]
    Sign {
        #[serde(rename = "signRequests")]
        sign_requests: Vec<SignRequest>,
    },
}

/// Resolve a caller-supplied timeout to the deadline duration.
///
/// `None` and `0` fall back to the 30 second default; anything else is
/// clamped up to at least one second.
pub fn resolve_timeout(timeout_seconds: Option<u64>) -> Duration {
    let seconds = match timeout_seconds {
        None | Some(0) => DEFAULT_TIMEOUT_SECONDS,
        Some(seconds) => seconds.max(1),
    };
    Duration::from_secs(seconds)
}

/// The sentinel payload delivered when a deadline fires first.
pub fn timeout_response() -> Value {
    json!({ "errorCode": TIMEOUT_ERROR_CODE })
}
