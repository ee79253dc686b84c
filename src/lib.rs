//! GTPv2-C endpoint library
//!
//! This crate implements a GTPv2-C (GPRS Tunnelling Protocol control plane,
//! 3GPP TS 29.274) endpoint: a connection object that multiplexes a single
//! UDP socket across many peers, correlates requests and responses through
//! a 24-bit sequence counter, validates and dispatches incoming control
//! messages to registered handlers, and tracks sessions by TEID and IMSI.
//!
//! A connection is created with [`Conn::dial`] (echo handshake first),
//! [`Conn::listen`] (serve immediately) or [`Conn::attach`] (adopt an
//! existing socket). Handlers for EchoResponse and
//! VersionNotSupportedIndication are registered out of the box; everything
//! else — Echo Requests included — is the application's to register via
//! [`Conn::add_handler`].

pub mod conn;
pub mod error;
pub mod handler;
pub mod header;
pub mod ie;
pub mod message;
pub mod session;
pub mod types;


pub use conn::{Conn, ECHO_HANDSHAKE_TIMEOUT, MAX_DATAGRAM_LEN, SEQUENCE_MAX};
pub use error::{Gtp2cError, Gtp2cResult};
pub use handler::{handler_func, HandlerFunc, HandlerFuture, HandlerTable};
pub use header::{message_type_name, Header, MessageType};
pub use ie::{Ie, IeType};
pub use message::{
    CreateSessionRequest, DeleteBearerRequest, DeleteSessionRequest, Message,
    ModifyBearerRequest,
};
pub use session::{Bearer, Session, DEFAULT_BEARER_NAME};

/// GTPv2-C UDP port (2123)
pub const GTPV2C_UDP_PORT: u16 = 2123;
