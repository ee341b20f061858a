use std::sync::atomic::Ordering;

use tokio::sync::mpsc::Receiver;

use crate::error::HttpServerError;
use crate::server::Engine;
use crate::server::events::ConnectEvent;

/// Body of the acceptor thread.
///
/// Each `Connect` event admits at most one pending connection. With the
/// pool full the accept is deferred; the dispatcher re-issues one deferred
/// accept per slot it frees.
pub(crate) fn run(engine: &Engine, mut connect: Receiver<ConnectEvent>) {
    tracing::debug!("acceptor started");

    while let Some(event) = connect.blocking_recv() {
        if event == ConnectEvent::Stop || engine.quit.load(Ordering::Acquire) {
            break;
        }

        if !engine.pool.has_capacity() {
            let deferred = engine.deferred_accepts.fetch_add(1, Ordering::AcqRel) + 1;
            tracing::warn!(deferred, "connection pool exhausted, deferring accept");
            continue;
        }

        let socket = match engine.transport.accept() {
            Ok(socket) => socket,
            Err(HttpServerError::NotFound) => {
                tracing::debug!("connect event without a pending connection");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };

        if engine.pool.allocate(socket).is_none() {
            tracing::error!(socket = %socket, "no free stream for accepted socket");
            engine.transport.disconnect(socket);
            continue;
        }

        if let Err(e) = engine.transport.watch(socket) {
            tracing::error!(socket = %socket, error = %e, "failed to watch socket");
            engine.pool.release(socket);
            engine.transport.disconnect(socket);
            continue;
        }

        tracing::info!(socket = %socket, active = engine.pool.active_count(), "connection accepted");

        // The first request may already be buffered before the transport
        // starts watching.
        engine.notifier.packet_received(socket);
    }

    tracing::debug!("acceptor stopped");
}
