//! The transport seam to the privileged host and the bridge orchestrator
//! that ties the correlation table, deadline timers, and response
//! normalization together.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::correlation::{CorrelationTable, CounterTransition, PendingRequest, RequestId};
use crate::dispatch::normalize_response;
use crate::protocol::{resolve_timeout, RequestEnvelope};
use crate::timeout;

/// Host-side event primitive the bridge drives.
///
/// Implementations must not call back into the bridge from these methods;
/// inbound responses enter through [`U2fBridge::handle_response`] on a later
/// event-loop turn.
pub trait HostTransport: Send + Sync {
    /// Emit one outbound request event. The id, page origin, and resolved
    /// timeout travel out of band alongside the envelope.
    fn emit_request(
        &self,
        envelope: &RequestEnvelope,
        id: RequestId,
        origin: &str,
        timeout: Duration,
    );

    /// Start listening for inbound response events. Idempotent; the bridge
    /// calls it exactly once per 0→1 transition of outstanding requests.
    fn subscribe(&self);

    /// Stop listening for inbound response events. Idempotent; called
    /// exactly once per 1→0 transition.
    fn unsubscribe(&self);
}

/// Page-facing side of the U2F bridge. One instance per page context.
///
/// All requests funnel through [`send`](Self::send); the host delivers
/// responses through [`handle_response`](Self::handle_response). Each pending
/// request is delivered to exactly once, by whichever of the host response or
/// its deadline arrives first.
pub struct U2fBridge {
    transport: Arc<dyn HostTransport>,
    origin: String,
    state: Mutex<CorrelationTable>,
    // Handed to deadline timers so they can deliver without keeping the
    // bridge alive.
    weak_self: Weak<U2fBridge>,
}

impl U2fBridge {
    /// Build a bridge for one page context, capturing its origin once.
    pub fn new(transport: Arc<dyn HostTransport>, origin: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            transport,
            origin: origin.into(),
            state: Mutex::new(CorrelationTable::new()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of requests currently awaiting a response or deadline.
    pub fn active_requests(&self) -> usize {
        self.state.lock().unwrap().active()
    }

    /// Send one request envelope to the host.
    ///
    /// Allocates the id, stores the callback, arms the deadline, and emits
    /// the event in a single synchronous step, subscribing to inbound
    /// responses on the 0→1 transition. Never emits without an id. Must be
    /// called within a tokio runtime (the deadline is a spawned task).
    pub fn send<F>(
        &self,
        envelope: RequestEnvelope,
        callback: F,
        timeout_seconds: Option<u64>,
    ) -> RequestId
    where
        F: FnOnce(Value) + Send + 'static,
    {
        let timeout = resolve_timeout(timeout_seconds);

        let mut state = self.state.lock().unwrap();
        let id = state.allocate();
        let deadline = timeout::arm(self.weak_self.clone(), id, timeout);
        let transition = state.insert(
            id,
            PendingRequest {
                callback: Box::new(callback),
                deadline,
                origin: self.origin.clone(),
                timeout,
            },
        );
        if transition == CounterTransition::BecameActive {
            self.transport.subscribe();
        }
        self.transport.emit_request(&envelope, id, &self.origin, timeout);
        id
    }

    /// Single inbound entry point for the privileged host: normalize the
    /// response and route it to the pending callback.
    pub fn handle_response(&self, id: RequestId, response: Value) {
        let payload = normalize_response(response);
        self.deliver(id, payload);
    }

    /// Deliver `payload` to the pending request `id`, if still pending.
    ///
    /// A second delivery for the same id (late response after a timeout, or
    /// a timer firing after the response) is a no-op. The page callback runs
    /// inside a panic boundary and outside the state lock, so a misbehaving
    /// callback can neither poison bridge state nor skip the bookkeeping
    /// that follows it.
    pub(crate) fn deliver(&self, id: RequestId, payload: Value) {
        let entry = self.state.lock().unwrap().take(id);
        let Some(entry) = entry else {
            return;
        };

        entry.deadline.cancel();
        debug!(
            target = "u2f",
            id,
            origin = %entry.origin,
            timeout_secs = entry.timeout.as_secs(),
            "delivering response"
        );

        let callback = entry.callback;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(move || callback(payload))) {
            warn!(
                target = "u2f",
                id,
                panic = panic_message(panic.as_ref()),
                "response callback panicked during delivery"
            );
        }

        let transition = self.state.lock().unwrap().settle();
        if transition == CounterTransition::BecameIdle {
            self.transport.unsubscribe();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
