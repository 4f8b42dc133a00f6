//! Page↔host bridge for the legacy U2F API surface.
//!
//! The core is the request/response correlation protocol: monotonically
//! increasing request ids, per-request deadline timers, an inbound
//! subscription that exists exactly while requests are outstanding, and
//! exactly-once delivery to page callbacks. The `register`/`sign`
//! operations, the legacy calling convention, and the extension-messaging
//! fanout layer sit on top of that core. The privileged host that actually
//! performs U2F operations lives behind the [`HostTransport`] trait.

pub mod api;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod protocol;
pub mod timeout;
pub mod transport;

pub use api::{LegacyRegisterCall, LegacySignCall};
pub use correlation::RequestId;
pub use error::{LegacyCallError, PortMessageError};
pub use fanout::{Port, Runtime};
pub use protocol::{RegisterRequest, RegisteredKey, RequestEnvelope, SignRequest};
pub use transport::{HostTransport, U2fBridge};
