use std::sync::atomic::Ordering;

use tokio::sync::mpsc::Receiver;

use crate::server::Engine;
use crate::server::events::ServerEvent;
use crate::transport::{RecvOutcome, SocketId};

/// Body of the event dispatcher thread.
pub(crate) fn run(engine: &Engine, mut events: Receiver<ServerEvent>) {
    tracing::debug!("event dispatcher started");
    let mut buf = vec![0u8; engine.config.mtu_size];

    while let Some(event) = events.blocking_recv() {
        match event {
            ServerEvent::PacketReceived(socket) => on_packet(engine, socket, &mut buf),
            ServerEvent::Disconnect(socket) => disconnect(engine, socket),
            ServerEvent::Stop => {
                engine.quit.store(true, Ordering::Release);
                for socket in engine.pool.drain() {
                    engine.transport.disconnect(socket);
                }
                break;
            }
        }
    }

    tracing::debug!("event dispatcher stopped");
}

fn on_packet(engine: &Engine, socket: SocketId, buf: &mut [u8]) {
    let Some(stream) = engine.pool.find(socket) else {
        tracing::trace!(socket = %socket, "stale receive event");
        return;
    };

    match engine.transport.recv(socket, buf) {
        RecvOutcome::NoData => {}
        RecvOutcome::Closed => {
            tracing::debug!(socket = %socket, "peer closed connection");
            for orphan in engine.pool.release_orphans() {
                tracing::debug!(socket = %orphan, "reclaiming orphaned stream");
                engine.transport.disconnect(orphan);
            }
            disconnect(engine, socket);
        }
        RecvOutcome::Data(n) => {
            let hooks = engine.hooks.as_deref();
            if let Err(e) = stream.on_packet(&engine.registry, hooks, &buf[..n]) {
                tracing::debug!(socket = %socket, error = %e, "request not served");
            }
        }
    }
}

/// Tears a connection down and returns its stream to the pool.
fn disconnect(engine: &Engine, socket: SocketId) {
    let Some(stream) = engine.pool.find(socket) else {
        return;
    };

    if let Some(hooks) = engine.hooks.as_deref() {
        hooks.on_disconnect(stream.response());
    }

    engine.pool.release(socket);
    engine.transport.disconnect(socket);
    tracing::info!(socket = %socket, active = engine.pool.active_count(), "connection closed");

    let retry = engine
        .deferred_accepts
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok();
    if retry {
        tracing::debug!("re-issuing deferred accept");
        engine.notifier.connection_pending();
    }
}
