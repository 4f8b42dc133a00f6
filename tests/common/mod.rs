//! Shared test transport: records emitted request events and tracks the
//! inbound subscription state the bridge drives.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use u2f_bridge::{HostTransport, RequestEnvelope, RequestId};

pub struct EmittedRequest {
    pub envelope: Value,
    pub id: RequestId,
    pub origin: String,
    pub timeout: Duration,
}

#[derive(Default)]
pub struct MockTransport {
    emitted: Mutex<Vec<EmittedRequest>>,
    subscribed: AtomicBool,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emitted_ids(&self) -> Vec<RequestId> {
        self.emitted.lock().unwrap().iter().map(|e| e.id).collect()
    }

    pub fn emitted_envelopes(&self) -> Vec<Value> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.envelope.clone())
            .collect()
    }

    pub fn last_emitted(&self) -> EmittedRequest {
        let emitted = self.emitted.lock().unwrap();
        let last = emitted.last().expect("no request emitted");
        EmittedRequest {
            envelope: last.envelope.clone(),
            id: last.id,
            origin: last.origin.clone(),
            timeout: last.timeout,
        }
    }

    pub fn emitted_count(&self) -> usize {
        self.emitted.lock().unwrap().len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

impl HostTransport for MockTransport {
    fn emit_request(
        &self,
        envelope: &RequestEnvelope,
        id: RequestId,
        origin: &str,
        timeout: Duration,
    ) {
        let envelope = serde_json::to_value(envelope).expect("serialize envelope");
        self.emitted.lock().unwrap().push(EmittedRequest {
            envelope,
            id,
            origin: origin.to_owned(),
            timeout,
        });
    }

    fn subscribe(&self) {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribed.store(true, Ordering::SeqCst);
    }

    fn unsubscribe(&self) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
    }
}

/// Let spawned deadline tasks run after a virtual-time advance.
pub async fn drain_tasks() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("u2f=debug")),
        )
        .with_test_writer()
        .try_init();
}
