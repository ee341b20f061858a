//! Bounded event queues between the transport and the engine threads.

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::{HttpServerError, Result};
use crate::transport::SocketId;

/// Work for the acceptor thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectEvent {
    /// A connection is waiting to be accepted.
    Connect,
    Stop,
}

/// Work for the event dispatcher thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    PacketReceived(SocketId),
    Disconnect(SocketId),
    Stop,
}

/// Receiving halves, one per engine thread.
#[derive(Debug)]
pub struct EventReceivers {
    pub connect: Receiver<ConnectEvent>,
    pub events: Receiver<ServerEvent>,
}

/// Creates both queues and the producer handle that feeds them.
pub fn channel(connect_depth: usize, event_depth: usize) -> Result<(EventNotifier, EventReceivers)> {
    if connect_depth == 0 || event_depth == 0 {
        return Err(HttpServerError::QueueInit("queue depth must be non-zero"));
    }
    let (connect_tx, connect) = mpsc::channel(connect_depth);
    let (events_tx, events) = mpsc::channel(event_depth);
    Ok((
        EventNotifier {
            connect: connect_tx,
            events: events_tx,
        },
        EventReceivers { connect, events },
    ))
}

/// Producer handle for both queues.
///
/// Posting never blocks: a full queue drops the event and reports it.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    connect: Sender<ConnectEvent>,
    events: Sender<ServerEvent>,
}

impl EventNotifier {
    /// A connection is pending on the listener.
    pub fn connection_pending(&self) -> bool {
        post(&self.connect, ConnectEvent::Connect)
    }

    /// Data (or a close) is readable on `socket`.
    pub fn packet_received(&self, socket: SocketId) -> bool {
        post(&self.events, ServerEvent::PacketReceived(socket))
    }

    /// `socket` went away or should be torn down.
    pub fn disconnected(&self, socket: SocketId) -> bool {
        post(&self.events, ServerEvent::Disconnect(socket))
    }

    pub(crate) fn request_disconnect(&self, socket: SocketId) -> Result<()> {
        if self.disconnected(socket) {
            Ok(())
        } else {
            Err(HttpServerError::QueueFull)
        }
    }

    /// Queues `Stop` on both queues, waiting for room.
    ///
    /// Inside a tokio runtime the blocking sends run on a helper thread.
    pub(crate) fn stop(&self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| {
                scope.spawn(|| self.send_stop());
            });
        } else {
            self.send_stop();
        }
    }

    fn send_stop(&self) {
        let _ = self.connect.blocking_send(ConnectEvent::Stop);
        let _ = self.events.blocking_send(ServerEvent::Stop);
    }
}

fn post<T: std::fmt::Debug>(tx: &Sender<T>, event: T) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            tracing::warn!(?event, "event queue full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
