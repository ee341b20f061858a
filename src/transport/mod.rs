//! Socket transport boundary.
//!
//! The engine never touches sockets directly. A [`Transport`] owns the
//! listening socket and every accepted connection, identifies them by
//! [`SocketId`], and reports activity by posting events through the
//! [`EventNotifier`] it receives in [`Transport::start`]. Producers must
//! never block: the notifier only ever enqueues.
//!
//! [`TcpTransport`](tcp::TcpTransport) is the default implementation.

pub mod tcp;

use std::fmt;

use crate::config::SecurityCredentials;
use crate::error::{HttpServerError, Result};
use crate::server::events::EventNotifier;

/// Opaque identity of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a non-blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// `n` bytes were copied into the buffer.
    Data(usize),
    /// Nothing to read right now.
    NoData,
    /// The peer closed the connection or it failed.
    Closed,
}

pub trait Transport: Send + Sync {
    /// Starts listening. Connect, receive and disconnect notifications are
    /// posted through `notifier` from then on.
    fn start(&self, notifier: EventNotifier) -> Result<()>;

    /// Accepts one pending connection. `NotFound` when none is pending.
    fn accept(&self) -> Result<SocketId>;

    /// Begins posting receive and disconnect notifications for `socket`.
    fn watch(&self, socket: SocketId) -> Result<()>;

    /// Copies at most `buf.len()` received bytes without blocking.
    fn recv(&self, socket: SocketId, buf: &mut [u8]) -> RecvOutcome;

    /// Sends all of `data`.
    fn send(&self, socket: SocketId, data: &[u8]) -> Result<()>;

    fn flush(&self, _socket: SocketId) -> Result<()> {
        Ok(())
    }

    /// Closes `socket` and forgets it. Unknown sockets are ignored.
    fn disconnect(&self, socket: SocketId);

    /// Closes the listener and every connection.
    fn stop(&self);

    fn supports_tls(&self) -> bool {
        false
    }

    /// Installs the TLS identity used for secure connections.
    fn load_identity(&self, _credentials: &SecurityCredentials) -> Result<()> {
        Err(HttpServerError::Unsupported("TLS is not available on this transport"))
    }
}
