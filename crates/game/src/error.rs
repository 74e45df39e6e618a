use thiserror::Error;

/// Named validation/protocol failures for inbound wire messages (C1, C7, §7).
///
/// Every variant here is surfaced to the client as `{t:"error", message:"…"}`
/// except [`ProtocolError::InvalidFrame`], which the connection layer turns
/// into a hard close rather than a soft error reply.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("non-text websocket frame")]
    InvalidFrame,
    #[error("malformed json: {0}")]
    MalformedJson(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid type for field: {0}")]
    InvalidType(&'static str),
    #[error("value out of range for field: {0}")]
    InvalidRange(&'static str),
    #[error("non-finite float in field: {0}")]
    NonFinite(&'static str),
}

/// Rejections from [`crate::queue::CommandQueue::enqueue`] (C3, §7).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    QueueFull,
    #[error("duplicate sequence number")]
    DuplicateSequence,
    #[error("sequence number already consumed")]
    StaleSequence,
}
