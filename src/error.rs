use thiserror::Error;

/// Failures canonicalizing a legacy positional call into the structured form.
#[derive(Debug, Error)]
pub enum LegacyCallError {
    /// Legacy register calls reuse the first request's challenge for every
    /// synthesized sign request, so an empty request list has no challenge
    /// to reuse.
    #[error("legacy register call carries no register requests")]
    EmptyRequestList,
}

/// Failures decoding a message posted to a port. Every variant is mapped to
/// a silent drop by the fanout bridge; the type exists for diagnostics only.
#[derive(Debug, Error)]
pub enum PortMessageError {
    #[error("port message is not a JSON object")]
    NotAnObject,
    #[error("port message has no usable `{0}` field")]
    MissingField(&'static str),
    #[error("unrecognized port message type `{0}`")]
    UnknownType(String),
}
