//! Message handler table.
//!
//! Handlers are async callbacks keyed by message type code. Every new
//! connection starts from the default table (Echo Response validation and
//! VersionNotSupportedIndication handling); registering a handler on a
//! connection replaces the entry in that connection's own copy only.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use crate::conn::Conn;
use crate::error::{Gtp2cError, Gtp2cResult};
use crate::header::MessageType;
use crate::ie::IeType;
use crate::message::Message;

/// Future returned by a message handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Gtp2cResult<()>> + Send>>;

/// A message handler: invoked with the connection, the sender address and
/// the parsed message. Errors are funneled to the connection's error sink.
pub type HandlerFunc = Arc<dyn Fn(Arc<Conn>, SocketAddr, Message) -> HandlerFuture + Send + Sync>;

/// Wrap an async fn or closure as a [`HandlerFunc`].
pub fn handler_func<F, Fut>(f: F) -> HandlerFunc
where
    F: Fn(Arc<Conn>, SocketAddr, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Gtp2cResult<()>> + Send + 'static,
{
    Arc::new(move |conn, peer, msg| Box::pin(f(conn, peer, msg)))
}

/// Mapping from message type code to handler.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<u8, HandlerFunc>,
}

impl HandlerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any prior entry for the type
    pub fn store(&mut self, msg_type: u8, handler: HandlerFunc) {
        self.handlers.insert(msg_type, handler);
    }

    /// Register several handlers at once
    pub fn store_all(&mut self, handlers: HashMap<u8, HandlerFunc>) {
        for (msg_type, handler) in handlers {
            self.store(msg_type, handler);
        }
    }

    /// Look up the handler for a type
    pub fn load(&self, msg_type: u8) -> Option<HandlerFunc> {
        self.handlers.get(&msg_type).cloned()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The default handler table every connection starts from. Built once for
/// the process; each connection gets its own clone, so per-connection
/// registration never touches the defaults.
pub(crate) fn default_handler_table() -> HandlerTable {
    static DEFAULT: OnceLock<HandlerTable> = OnceLock::new();
    DEFAULT
        .get_or_init(|| {
            let mut table = HandlerTable::new();
            table.store(
                MessageType::EchoResponse as u8,
                handler_func(handle_echo_response),
            );
            table.store(
                MessageType::VersionNotSupportedIndication as u8,
                handler_func(handle_version_not_supported),
            );
            table
        })
        .clone()
}

/// Validate an Echo Response; the peer's restart counter must be present.
async fn handle_echo_response(
    _conn: Arc<Conn>,
    _peer: SocketAddr,
    msg: Message,
) -> Gtp2cResult<()> {
    if msg.find_ie(IeType::Recovery).is_none() {
        return Err(Gtp2cError::RequiredIeMissing {
            ie_type: IeType::Recovery as u8,
        });
    }
    Ok(())
}

/// Nothing to do; the indication already tells us the peer gave up on the
/// message that triggered it.
async fn handle_version_not_supported(
    _conn: Arc<Conn>,
    _peer: SocketAddr,
    _msg: Message,
) -> Gtp2cResult<()> {
    Ok(())
}
