//! The two page-facing U2F operations and the legacy positional calling
//! convention. Instead of sniffing argument types at runtime to tell the
//! two call shapes apart, each shape is its own entry point and the legacy
//! form is canonicalized upfront.

use serde_json::Value;

use crate::correlation::RequestId;
use crate::error::LegacyCallError;
use crate::protocol::{RegisterRequest, RegisteredKey, RequestEnvelope, SignRequest};
use crate::transport::U2fBridge;

/// Legacy `register(appId, requests, keys, callback, timeout)` call shape.
#[derive(Debug, Clone)]
pub struct LegacyRegisterCall {
    pub app_id: String,
    pub requests: Vec<RegisterRequest>,
    pub keys: Vec<RegisteredKey>,
}

impl LegacyRegisterCall {
    /// Produce the canonical `(requests, signRequests)` pair: the app id is
    /// stamped onto every request, and each key becomes a sign request
    /// reusing the first request's challenge.
    pub fn canonicalize(self) -> Result<(Vec<RegisterRequest>, Vec<SignRequest>), LegacyCallError> {
        let Self {
            app_id,
            mut requests,
            keys,
        } = self;

        let challenge = requests
            .first()
            .map(|request| request.challenge.clone())
            .ok_or(LegacyCallError::EmptyRequestList)?;

        for request in &mut requests {
            request.app_id = Some(app_id.clone());
        }

        let sign_requests = keys
            .into_iter()
            .map(|key| SignRequest {
                version: key.version,
                challenge: challenge.clone(),
                key_handle: key.key_handle,
                app_id: Some(app_id.clone()),
            })
            .collect();

        Ok((requests, sign_requests))
    }
}

/// Legacy `sign(appId, challenge, keys, callback, timeout)` call shape.
#[derive(Debug, Clone)]
pub struct LegacySignCall {
    pub app_id: String,
    pub challenge: String,
    pub keys: Vec<RegisteredKey>,
}

impl LegacySignCall {
    /// Synthesize the canonical `signRequests` list from the key descriptors.
    pub fn canonicalize(self) -> Vec<SignRequest> {
        let Self {
            app_id,
            challenge,
            keys,
        } = self;

        keys.into_iter()
            .map(|key| SignRequest {
                version: key.version,
                challenge: challenge.clone(),
                key_handle: key.key_handle,
                app_id: Some(app_id.clone()),
            })
            .collect()
    }
}

impl U2fBridge {
    /// Canonical register operation.
    pub fn register<F>(
        &self,
        requests: Vec<RegisterRequest>,
        sign_requests: Vec<SignRequest>,
        callback: F,
        timeout_seconds: Option<u64>,
    ) -> RequestId
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.send(
            RequestEnvelope::Register {
                requests,
                sign_requests,
            },
            callback,
            timeout_seconds,
        )
    }

    /// Canonical sign operation.
    pub fn sign<F>(
        &self,
        sign_requests: Vec<SignRequest>,
        callback: F,
        timeout_seconds: Option<u64>,
    ) -> RequestId
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.send(
            RequestEnvelope::Sign { sign_requests },
            callback,
            timeout_seconds,
        )
    }

    /// Legacy-form register; canonicalizes then funnels into
    /// [`register`](Self::register).
    pub fn register_legacy<F>(
        &self,
        call: LegacyRegisterCall,
        callback: F,
        timeout_seconds: Option<u64>,
    ) -> Result<RequestId, LegacyCallError>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        let (requests, sign_requests) = call.canonicalize()?;
        Ok(self.register(requests, sign_requests, callback, timeout_seconds))
    }

    /// Legacy-form sign; canonicalizes then funnels into [`sign`](Self::sign).
    pub fn sign_legacy<F>(
        &self,
        call: LegacySignCall,
        callback: F,
        timeout_seconds: Option<u64>,
    ) -> RequestId
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.sign(call.canonicalize(), callback, timeout_seconds)
    }
}
