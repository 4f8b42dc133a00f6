//! Per-request deadline timers. Each pending request arms exactly one timer
//! task that races the deadline against a cancel channel; on expiry it
//! synthesizes the canonical timeout response through the normal delivery
//! path, so idempotence in the correlation table resolves any race with the
//! real response.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::correlation::RequestId;
use crate::protocol::timeout_response;
use crate::transport::U2fBridge;

/// Handle to one armed deadline. Cancellation is idempotent; cancelling an
/// already-fired timer is a no-op.
pub struct DeadlineTimer {
    cancel_tx: mpsc::UnboundedSender<()>,
}

impl DeadlineTimer {
    pub(crate) fn new(cancel_tx: mpsc::UnboundedSender<()>) -> Self {
        Self { cancel_tx }
    }

    pub fn cancel(&self) {
        // Send failure means the timer task already finished.
        let _ = self.cancel_tx.send(());
    }
}

/// Arm a one-shot deadline for `id`. Must be called within a tokio runtime.
///
/// The timer holds only a weak bridge handle so an abandoned bridge is not
/// kept alive by its outstanding deadlines.
pub fn arm(bridge: Weak<U2fBridge>, id: RequestId, duration: Duration) -> DeadlineTimer {
    let (cancel_tx, mut cancel_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        tokio::select! {
            _ = sleep(duration) => {
                if let Some(bridge) = bridge.upgrade() {
                    bridge.deliver(id, timeout_response());
                }
            }
            _ = cancel_rx.recv() => {
                // Response arrived first; nothing to do.
            }
        }
    });

    DeadlineTimer::new(cancel_tx)
}
