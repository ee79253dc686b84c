//! Error types for the GTPv2-C endpoint.

use thiserror::Error;

/// GTPv2-C error type
#[derive(Error, Debug)]
pub enum Gtp2cError {
    /// Socket-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer too short for operation
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Invalid message format
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Message type does not match what the caller expected
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Serialized message would not fit the 16-bit length field
    #[error("message too large: {len} bytes")]
    MessageTooLarge { len: usize },

    /// No handler registered for the incoming message type
    #[error("no handlers found for incoming message: {msg_type_name}, ignoring")]
    HandlerNotFound { msg_type_name: String },

    /// Validation rejected a TEID unknown to the session registry
    #[error("got invalid TEID: {teid:#010x}")]
    InvalidTeid { teid: u32 },

    /// IMSI lookup failed
    #[error("got unknown IMSI: {imsi}")]
    UnknownImsi { imsi: String },

    /// Session operation rejected
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// A handler needed an IE the message did not carry
    #[error("required IE missing: type {ie_type}")]
    RequiredIeMissing { ie_type: u8 },

    /// Marshal or write failure in the send path; the sequence number was
    /// rolled back to the contained value.
    #[error("failed to send message, sequence rolled back to {sequence:#010x}")]
    SendFailed {
        sequence: u32,
        #[source]
        source: Box<Gtp2cError>,
    },

    /// No datagram arrived within the echo handshake deadline
    #[error("echo handshake timed out")]
    HandshakeTimeout,
}

/// GTPv2-C result type
pub type Gtp2cResult<T> = Result<T, Gtp2cError>;
