//! Correlation table: maps request ids to pending page callbacks and their
//! deadline timers, and tracks how many requests are outstanding so the
//! transport subscription can follow the 0↔1 transitions.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::timeout::DeadlineTimer;

/// Correlation id linking one outbound request to its inbound response.
/// Strictly increasing from 0 for the lifetime of a bridge; never reused.
pub type RequestId = u64;

/// One-shot callback receiving the (opaque) response payload.
pub type ResponseCallback = Box<dyn FnOnce(Value) + Send>;

/// An in-flight request awaiting its response or deadline.
pub struct PendingRequest {
    pub callback: ResponseCallback,
    pub deadline: DeadlineTimer,
    pub origin: String,
    pub timeout: Duration,
}

/// Active-request counter movement relevant to the inbound subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTransition {
    /// 0 → 1: the transport should start listening for responses.
    BecameActive,
    /// 1 → 0: the transport should stop listening.
    BecameIdle,
    Unchanged,
}

#[derive(Default)]
pub struct CorrelationTable {
    entries: HashMap<RequestId, PendingRequest>,
    next_id: RequestId,
    active: usize,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next request id. Ids are handed out exactly once.
    pub fn allocate(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Store a pending request and bump the active counter.
    pub fn insert(&mut self, id: RequestId, entry: PendingRequest) -> CounterTransition {
        let previous = self.entries.insert(id, entry);
        debug_assert!(previous.is_none(), "duplicate pending request id {id}");
        self.active += 1;
        if self.active == 1 {
            CounterTransition::BecameActive
        } else {
            CounterTransition::Unchanged
        }
    }

    /// Remove and return the entry for `id`. Returns `None` if the request
    /// was already delivered (or never existed), which makes delivery
    /// idempotent per id.
    pub fn take(&mut self, id: RequestId) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// Record that a taken entry finished delivery, decrementing the counter.
    /// Kept separate from [`take`](Self::take) so the page callback can run
    /// outside the state lock.
    pub fn settle(&mut self) -> CounterTransition {
        debug_assert!(self.active > 0, "settle without an outstanding request");
        self.active -= 1;
        if self.active == 0 {
            CounterTransition::BecameIdle
        } else {
            CounterTransition::Unchanged
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }
}
